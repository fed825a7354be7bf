//! Thread-to-async bridging primitives.
//!
//! ```text
//!   async caller ──submit──▶ WorkerThread (blocking call)
//!        ▲                        │ send (sync)
//!        │                        ▼
//!   StreamConsumer ◀──recv── BridgingChannel
//! ```

pub mod channel;
pub mod error;
pub mod station;
pub mod stream;
pub mod worker;

pub use channel::{BridgeReceiver, BridgeSender, Capacity, ChannelClosed, channel, unbounded};
pub use error::{ErrorReporter, LogReporter, StationError};
pub use station::{Station, StationRunner};
pub use stream::{Flow, StreamConsumer};
pub use worker::{Submission, WorkerThread};
