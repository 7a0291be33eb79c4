use serde::{Deserialize, Serialize};

use crate::context::RecordId;
use crate::request::TaskMode;

/// Kind of a published stream chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Intermediate chunk; more will follow.
    Partial,
    /// Last content chunk of the stream.
    Final,
}

/// One chunk of streamed response content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Chunk kind.
    pub kind: ChunkKind,
    /// Text content of this chunk.
    pub content: String,
}

impl StreamChunk {
    /// Creates an intermediate chunk.
    pub fn partial(content: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Partial,
            content: content.into(),
        }
    }

    /// Creates the final content chunk.
    pub fn last(content: impl Into<String>) -> Self {
        Self {
            kind: ChunkKind::Final,
            content: content.into(),
        }
    }
}

/// Events flowing over a stream session channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type", content = "data")]
pub enum StreamEvent {
    /// Content chunk.
    Chunk(StreamChunk),
    /// Stream finished normally. Terminal.
    Completed,
    /// Stream finished with an error. Terminal.
    Errored(String),
}

/// Identity of a stream session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamDescriptor {
    /// Conversation the stream belongs to.
    pub conversation_id: RecordId,
    /// Agent producing the stream.
    pub agent_slug: String,
    /// Mode of the originating request.
    pub mode: TaskMode,
}
