//! Bridging channel between worker threads and async tasks.
//!
//! The write side is synchronous and may be called from any OS thread. The
//! read side suspends only the calling task. Both halves preserve FIFO order.

use std::fmt;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Buffering policy for a bridging channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Capacity {
    /// Writes never block.
    #[default]
    Unbounded,
    /// Writes block (or suspend, for async writers) once `n` items are queued.
    Bounded(usize),
}

impl Capacity {
    /// Maps a configured capacity where `0` means unbounded.
    pub fn from_config(capacity: usize) -> Self {
        if capacity == 0 {
            Capacity::Unbounded
        } else {
            Capacity::Bounded(capacity)
        }
    }
}

/// The receiving half was dropped; the rejected item is handed back.
#[derive(PartialEq, Eq)]
pub struct ChannelClosed<T>(pub T);

impl<T> fmt::Debug for ChannelClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChannelClosed(..)")
    }
}

impl<T> fmt::Display for ChannelClosed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridging channel closed")
    }
}

impl<T> std::error::Error for ChannelClosed<T> {}

enum SenderInner<T> {
    Unbounded(mpsc::UnboundedSender<T>),
    Bounded(mpsc::Sender<T>),
}

enum ReceiverInner<T> {
    Unbounded(mpsc::UnboundedReceiver<T>),
    Bounded(mpsc::Receiver<T>),
}

/// Write side of a bridging channel.
pub struct BridgeSender<T> {
    inner: SenderInner<T>,
}

/// Read side of a bridging channel.
pub struct BridgeReceiver<T> {
    inner: ReceiverInner<T>,
}

/// Creates a new bridging channel with the given buffering policy.
pub fn channel<T>(capacity: Capacity) -> (BridgeSender<T>, BridgeReceiver<T>) {
    match capacity {
        Capacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                BridgeSender {
                    inner: SenderInner::Unbounded(tx),
                },
                BridgeReceiver {
                    inner: ReceiverInner::Unbounded(rx),
                },
            )
        }
        Capacity::Bounded(n) => {
            let (tx, rx) = mpsc::channel(n.max(1));
            (
                BridgeSender {
                    inner: SenderInner::Bounded(tx),
                },
                BridgeReceiver {
                    inner: ReceiverInner::Bounded(rx),
                },
            )
        }
    }
}

/// Creates an unbounded bridging channel.
pub fn unbounded<T>() -> (BridgeSender<T>, BridgeReceiver<T>) {
    channel(Capacity::Unbounded)
}

impl<T> BridgeSender<T> {
    /// Writes an item from a synchronous context.
    ///
    /// Never blocks on an unbounded channel. On a bounded channel this blocks
    /// the calling thread while the buffer is full, so it must be called from
    /// a worker thread and never from inside an async task.
    pub fn send(&self, item: T) -> Result<(), ChannelClosed<T>> {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(item).map_err(|e| ChannelClosed(e.0)),
            SenderInner::Bounded(tx) => tx.blocking_send(item).map_err(|e| ChannelClosed(e.0)),
        }
    }

    /// Writes an item from an async task, suspending while a bounded buffer is full.
    pub async fn send_async(&self, item: T) -> Result<(), ChannelClosed<T>> {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.send(item).map_err(|e| ChannelClosed(e.0)),
            SenderInner::Bounded(tx) => tx.send(item).await.map_err(|e| ChannelClosed(e.0)),
        }
    }

    /// Returns true once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            SenderInner::Unbounded(tx) => tx.is_closed(),
            SenderInner::Bounded(tx) => tx.is_closed(),
        }
    }
}

impl<T> Clone for BridgeSender<T> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            SenderInner::Unbounded(tx) => SenderInner::Unbounded(tx.clone()),
            SenderInner::Bounded(tx) => SenderInner::Bounded(tx.clone()),
        };
        Self { inner }
    }
}

impl<T> fmt::Debug for BridgeSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T> BridgeReceiver<T> {
    /// Waits for the next item.
    ///
    /// Returns `None` once every sender is dropped and the buffer is drained.
    pub async fn recv(&mut self) -> Option<T> {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.recv().await,
            ReceiverInner::Bounded(rx) => rx.recv().await,
        }
    }

    /// Blocking read for worker threads. Must not be called from an async task.
    pub fn blocking_recv(&mut self) -> Option<T> {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.blocking_recv(),
            ReceiverInner::Bounded(rx) => rx.blocking_recv(),
        }
    }

    /// Polls for the next item. Used by stream adapters.
    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.poll_recv(cx),
            ReceiverInner::Bounded(rx) => rx.poll_recv(cx),
        }
    }

    /// Closes the channel for writers while still allowing buffered items to be read.
    pub fn close(&mut self) {
        match &mut self.inner {
            ReceiverInner::Unbounded(rx) => rx.close(),
            ReceiverInner::Bounded(rx) => rx.close(),
        }
    }

    /// Number of items currently buffered.
    pub fn len(&self) -> usize {
        match &self.inner {
            ReceiverInner::Unbounded(rx) => rx.len(),
            ReceiverInner::Bounded(rx) => rx.len(),
        }
    }

    /// Returns true when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> fmt::Debug for BridgeReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeReceiver")
            .field("buffered", &self.len())
            .finish()
    }
}
