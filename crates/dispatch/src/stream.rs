//! Request-scoped streaming sessions.
//!
//! A session exists only when the caller asked for streaming; everyone else
//! holds `None` and the null check at the call site makes every stream
//! operation a no-op. Sessions are terminal after `complete` or `error` and
//! never reused across requests.

use dashmap::DashMap;
use proto::{Result, StreamChunk, StreamDescriptor, StreamError, StreamEvent, TaskRequest};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Hands out stream sessions and holds receivers until the transport drains
/// them.
pub struct StreamBroker {
    buffer: usize,
    receivers: DashMap<String, mpsc::Receiver<StreamEvent>>,
}

impl StreamBroker {
    /// Creates a broker with the given per-session channel buffer.
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer,
            receivers: DashMap::new(),
        }
    }

    /// Opens a session for the request, or `None` when streaming was not
    /// requested. A caller-provided id wins over the request's own stream id;
    /// otherwise a fresh one is generated.
    pub fn open(
        &self,
        descriptor: StreamDescriptor,
        request: &TaskRequest,
        provided_id: Option<&str>,
    ) -> Option<StreamSession> {
        if !request.wants_stream() {
            return None;
        }

        let stream_id = provided_id
            .or_else(|| request.stream_id())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let (tx, rx) = mpsc::channel(self.buffer);
        self.receivers.insert(stream_id.clone(), rx);
        debug!("Stream session opened: {stream_id}");

        Some(StreamSession {
            stream_id,
            descriptor,
            tx,
        })
    }

    /// Takes ownership of the event receiver for a session. The transport
    /// calls this once to start draining.
    pub fn take_receiver(&self, stream_id: &str) -> Option<mpsc::Receiver<StreamEvent>> {
        self.receivers.remove(stream_id).map(|(_, rx)| rx)
    }

    /// Drops an undrained receiver (e.g. the caller went away before
    /// subscribing).
    pub fn discard(&self, stream_id: &str) {
        self.receivers.remove(stream_id);
    }

    /// Number of sessions whose receivers have not been taken yet.
    pub fn undrained_sessions(&self) -> usize {
        self.receivers.len()
    }
}

/// One live streaming session
pub struct StreamSession {
    stream_id: String,
    descriptor: StreamDescriptor,
    tx: mpsc::Sender<StreamEvent>,
}

impl StreamSession {
    /// Identifier callers use to subscribe to this stream.
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Descriptor of the originating request.
    pub fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    /// Publishes a content chunk.
    pub async fn publish_chunk(&self, chunk: StreamChunk) -> Result<()> {
        self.tx
            .send(StreamEvent::Chunk(chunk))
            .await
            .map_err(|_| StreamError::Closed(self.stream_id.clone()))?;
        Ok(())
    }

    /// Marks the stream complete. Terminal: consumes the session.
    pub async fn complete(self) -> Result<()> {
        self.tx
            .send(StreamEvent::Completed)
            .await
            .map_err(|_| StreamError::Closed(self.stream_id.clone()))?;
        Ok(())
    }

    /// Marks the stream errored. Terminal: consumes the session.
    pub async fn error(self, message: impl Into<String>) -> Result<()> {
        self.tx
            .send(StreamEvent::Errored(message.into()))
            .await
            .map_err(|_| StreamError::Closed(self.stream_id.clone()))?;
        Ok(())
    }
}
