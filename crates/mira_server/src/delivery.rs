//! Writing an event stream to a transport, one flushed frame per event.

use crate::responder::EventStream;
use crate::wire::StreamEvent;
use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use mira_error::{ServerError, ServerErrorKind};
use std::panic::AssertUnwindSafe;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, Span, debug, error, instrument, warn};

/// Destination of encoded SSE frames.
///
/// `send` returns once the frame has been handed to the transport; a sink
/// must not hold frames back to batch them.
#[async_trait::async_trait]
pub trait ChunkSink: Send {
    /// Write and flush one frame.
    async fn send(&mut self, frame: Bytes) -> Result<(), ServerError>;
}

/// Frames flow through a bounded channel into an HTTP response body.
///
/// With capacity one, each `send` waits until the body has taken the
/// previous frame, so every event is written before the next is produced.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
    sent: usize,
}

/// Body stream fed by a [`ChannelSink`].
pub type FrameStream = ReceiverStream<Result<Bytes, std::io::Error>>;

impl ChannelSink {
    /// Create a sink and the body stream it feeds.
    pub fn channel() -> (Self, FrameStream) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx, sent: 0 }, ReceiverStream::new(rx))
    }

    /// Frames accepted by the body so far.
    pub fn sent(&self) -> usize {
        self.sent
    }
}

#[async_trait::async_trait]
impl ChunkSink for ChannelSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), ServerError> {
        self.tx.send(Ok(frame)).await.map_err(|_| {
            ServerError::new(ServerErrorKind::Transport(
                "response body closed by the client".to_string(),
            ))
        })?;
        self.sent += 1;
        Ok(())
    }
}

/// How a delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// All events including the sentinel were written
    Completed {
        /// Frames written
        frames: usize,
    },
    /// The event stream ended early (cancellation or deadline)
    Truncated {
        /// Frames written
        frames: usize,
    },
    /// A write failed; remaining events were dropped
    TransportClosed {
        /// Frames written before the failure
        frames: usize,
    },
    /// An event could not be encoded, or producing one panicked; remaining
    /// events were dropped
    Aborted {
        /// Frames written before the failure
        frames: usize,
    },
}

impl DeliveryOutcome {
    /// Frames written to the sink.
    pub fn frames(&self) -> usize {
        match *self {
            Self::Completed { frames }
            | Self::Truncated { frames }
            | Self::TransportClosed { frames }
            | Self::Aborted { frames } => frames,
        }
    }

    /// Whether the stream ended with the sentinel.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Encode and write each event in order.
///
/// Stops at the first encoding or write failure without retrying; the event
/// stream (and the request scope it owns) is dropped on return, cancelling
/// any outstanding work.
#[instrument(skip_all)]
pub async fn deliver<K>(mut events: EventStream, sink: &mut K) -> DeliveryOutcome
where
    K: ChunkSink + ?Sized,
{
    let mut frames = 0;
    while let Some(event) = events.next().await {
        let frame = match event.encode() {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, frames, "Failed to encode stream event, closing stream");
                return DeliveryOutcome::Aborted { frames };
            }
        };

        if let Err(e) = sink.send(frame).await {
            warn!(error = %e, frames, "Transport write failed, abandoning stream");
            return DeliveryOutcome::TransportClosed { frames };
        }
        frames += 1;

        if event == StreamEvent::Done {
            debug!(frames, "Stream completed");
            return DeliveryOutcome::Completed { frames };
        }
    }

    debug!(frames, "Stream ended without sentinel");
    DeliveryOutcome::Truncated { frames }
}

/// Deliver `events` from a background task.
///
/// Returns the body stream to hand to the response and the task's handle.
/// The body ends when delivery does; a panic while producing or writing
/// events is logged and ends the body early with
/// [`DeliveryOutcome::Aborted`].
pub fn spawn_delivery(events: EventStream) -> (FrameStream, JoinHandle<DeliveryOutcome>) {
    let (mut sink, body) = ChannelSink::channel();

    let handle = tokio::spawn(
        async move {
            let result = AssertUnwindSafe(deliver(events, &mut sink))
                .catch_unwind()
                .await;
            match result {
                Ok(outcome) => {
                    debug!(?outcome, "Stream delivery finished");
                    outcome
                }
                Err(_) => {
                    error!(frames = sink.sent(), "Stream delivery panicked, closing connection");
                    DeliveryOutcome::Aborted {
                        frames: sink.sent(),
                    }
                }
            }
        }
        .instrument(Span::current()),
    );

    (body, handle)
}
