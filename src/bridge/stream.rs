//! Pull-style stream over a push-style bridging channel.

use crate::bridge::channel::BridgeReceiver;
use crate::error::{BridgeError, Result};
use futures_util::Stream;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

/// What the consumer does with one channel message.
#[derive(Debug)]
pub enum Flow<T> {
    /// Hand the value to the caller.
    Yield(T),
    /// Drop the message and keep reading.
    Skip,
    /// Terminal marker: end the stream without yielding.
    Finish,
    /// Terminal marker carrying an error: yield it, then end the stream.
    Fail(BridgeError),
}

/// Reads a bridging channel until a terminal marker is observed.
///
/// Single-consumption: once the terminal marker (or an interruption) has been
/// seen, every further poll returns `None`. If the channel closes before any
/// terminal marker, the stream yields `BridgeError::StreamInterrupted` once.
pub struct StreamConsumer<M, T> {
    rx: BridgeReceiver<M>,
    classify: fn(M) -> Flow<T>,
    done: bool,
}

impl<M, T> StreamConsumer<M, T> {
    /// Wraps a receiver with a message classifier.
    pub fn new(rx: BridgeReceiver<M>, classify: fn(M) -> Flow<T>) -> Self {
        Self {
            rx,
            classify,
            done: false,
        }
    }

    /// Returns true once the terminal marker has been consumed.
    pub fn is_terminated(&self) -> bool {
        self.done
    }
}

impl<M, T> Stream for StreamConsumer<M, T> {
    type Item = Result<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        loop {
            match ready!(this.rx.poll_recv(cx)) {
                Some(message) => match (this.classify)(message) {
                    Flow::Yield(value) => return Poll::Ready(Some(Ok(value))),
                    Flow::Skip => continue,
                    Flow::Finish => {
                        this.done = true;
                        this.rx.close();
                        return Poll::Ready(None);
                    }
                    Flow::Fail(err) => {
                        this.done = true;
                        this.rx.close();
                        return Poll::Ready(Some(Err(err)));
                    }
                },
                None => {
                    this.done = true;
                    return Poll::Ready(Some(Err(BridgeError::StreamInterrupted)));
                }
            }
        }
    }
}
