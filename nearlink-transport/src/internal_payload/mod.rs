//! Internal payload (§4.4): the framing-layer view of an application
//! payload as a chunk producer (outgoing) or chunk consumer (incoming).

mod incoming;
mod outgoing;

pub use incoming::{AttachOutcome, CompletedPayload, IncomingPayload};
pub use outgoing::{DetachOutcome, OutgoingPayload};

use nearlink_core::frame::{FirstChunkHeader, PayloadChunk};
use nearlink_core::payload::{PayloadId, PayloadKind, PayloadSize};
use thiserror::Error;

/// Errors raised attaching/detaching chunks of a payload (§4.4, §7
/// "Protocol" errors).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("chunk offset {got} does not match expected offset {expected}")]
    OffsetMismatch { expected: u64, got: u64 },
    #[error("chunk body of {got} bytes would exceed the declared total of {declared}")]
    BodyExceedsDeclaredTotal { declared: u64, got: u64 },
    #[error("first chunk for payload did not carry a header")]
    MissingFirstChunkHeader,
}

fn chunk_header_for(kind: PayloadKind, declared_size: PayloadSize) -> FirstChunkHeader {
    FirstChunkHeader { payload_kind: kind, total_size: declared_size.to_wire() }
}

/// A chunk ready to be wrapped as `PAYLOAD_TRANSFER::Data` and written to a
/// channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedChunk {
    pub payload_id: PayloadId,
    pub offset: u64,
    pub last_chunk: bool,
    pub first_chunk_header: Option<FirstChunkHeader>,
    pub body: Vec<u8>,
}

impl From<DetachedChunk> for PayloadChunk {
    fn from(chunk: DetachedChunk) -> Self {
        PayloadChunk {
            payload_id: chunk.payload_id,
            offset: chunk.offset,
            last_chunk: chunk.last_chunk,
            first_chunk_header: chunk.first_chunk_header,
            body: bytes::Bytes::from(chunk.body),
        }
    }
}
