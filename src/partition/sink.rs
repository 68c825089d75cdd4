//! Result delivery from an engine to the caller.
//!
//! A [`ResultSink`] is the write-only half handed to a state machine with
//! each request. It delivers zero or more output chunks followed by one
//! terminal event. The caller reads the events from the paired
//! [`ResultStream`], asynchronously relative to submission.

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;

/// Event delivered through a result sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    /// A chunk of output.
    Chunk(Bytes),
    /// Successful end of output.
    Complete,
    /// Failed end of output.
    Error(String),
}

impl SinkEvent {
    /// Check if this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk(_))
    }
}

/// Error reported by a state machine through its sink.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("state machine error: {0}")]
pub struct OutputError(pub String);

/// Write half of a result channel.
#[derive(Debug)]
pub struct ResultSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
    terminated: bool,
}

impl ResultSink {
    /// Create a connected sink and stream.
    pub fn channel() -> (ResultSink, ResultStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ResultSink {
                tx,
                terminated: false,
            },
            ResultStream { rx, done: false },
        )
    }

    /// Deliver an output chunk.
    ///
    /// Returns false if the reader has gone away or the sink is terminated.
    pub fn send(&mut self, chunk: impl Into<Bytes>) -> bool {
        if self.terminated {
            return false;
        }
        self.tx.send(SinkEvent::Chunk(chunk.into())).is_ok()
    }

    /// Deliver a single chunk and complete.
    pub fn reply(mut self, chunk: impl Into<Bytes>) {
        self.send(chunk);
        self.complete();
    }

    /// End the output successfully.
    pub fn complete(mut self) {
        self.terminate(SinkEvent::Complete);
    }

    /// End the output with an error.
    pub fn fail(mut self, message: impl Into<String>) {
        self.terminate(SinkEvent::Error(message.into()));
    }

    /// Check if the reader has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn terminate(&mut self, event: SinkEvent) {
        if !self.terminated {
            self.terminated = true;
            let _ = self.tx.send(event);
        }
    }
}

/// Read half of a result channel.
#[derive(Debug)]
pub struct ResultStream {
    rx: mpsc::UnboundedReceiver<SinkEvent>,
    done: bool,
}

impl ResultStream {
    /// Receive the next event.
    ///
    /// A sink dropped without a terminal event reads as [`SinkEvent::Complete`].
    /// Returns None after the terminal event.
    pub async fn recv(&mut self) -> Option<SinkEvent> {
        if self.done {
            return None;
        }
        let event = self.rx.recv().await.unwrap_or(SinkEvent::Complete);
        if event.is_terminal() {
            self.done = true;
        }
        Some(event)
    }

    /// Read every chunk until the terminal event.
    pub async fn collect(mut self) -> Result<Vec<Bytes>, OutputError> {
        let mut chunks = Vec::new();
        while let Some(event) = self.recv().await {
            match event {
                SinkEvent::Chunk(chunk) => chunks.push(chunk),
                SinkEvent::Complete => break,
                SinkEvent::Error(message) => return Err(OutputError(message)),
            }
        }
        Ok(chunks)
    }

    /// Read a single-chunk reply.
    pub async fn single(self) -> Result<Bytes, OutputError> {
        let mut chunks = self.collect().await?;
        match chunks.len() {
            1 => Ok(chunks.remove(0)),
            n => Err(OutputError(format!("expected one output chunk, got {}", n))),
        }
    }
}
