use super::ProtocolError;
use nearlink_core::frame::PayloadChunk;
use nearlink_core::payload::{PayloadId, PayloadKind, PayloadSize};
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};

/// A payload once fully reassembled, handed to the application via
/// `on_payload_received` (§6).
#[derive(Debug)]
pub struct CompletedPayload {
    pub id: PayloadId,
    pub kind: PayloadKind,
    pub bytes: Option<Vec<u8>>,
}

/// Outcome of [`IncomingPayload::attach_chunk`].
#[derive(Debug)]
pub enum AttachOutcome {
    InProgress,
    Completed(CompletedPayload),
}

enum Sink {
    Buffer(Vec<u8>),
    File(File),
}

/// A payload as seen by the reader loop (§4.5): a chunk consumer that
/// enforces the §3 "offset monotonic, in order" invariant.
pub struct IncomingPayload {
    id: PayloadId,
    kind: Option<PayloadKind>,
    declared_size: Option<PayloadSize>,
    expected_offset: u64,
    canceled: bool,
    sink: Sink,
}

impl IncomingPayload {
    /// Buffers bytes/stream payloads in memory; used until the first chunk
    /// reveals the payload's real kind.
    pub fn new(id: PayloadId) -> Self {
        Self {
            id,
            kind: None,
            declared_size: None,
            expected_offset: 0,
            canceled: false,
            sink: Sink::Buffer(Vec::new()),
        }
    }

    /// Routes reassembly to disk instead of memory. Used once the
    /// endpoint manager decides a payload should be written straight to a
    /// file (§4.4 "FILE type ... partial writes are flushed to disk per
    /// chunk").
    pub fn into_file(self, file: File) -> Self {
        Self { sink: Sink::File(file), ..self }
    }

    pub fn id(&self) -> PayloadId {
        self.id
    }

    pub fn current_offset(&self) -> u64 {
        self.expected_offset
    }

    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    /// Appends `chunk` at its declared offset, enforcing in-order delivery
    /// (§3 invariant: "out-of-order chunks are a protocol error").
    pub fn attach_chunk(&mut self, chunk: &PayloadChunk) -> Result<AttachOutcome, ProtocolError> {
        if chunk.offset != self.expected_offset {
            return Err(ProtocolError::OffsetMismatch { expected: self.expected_offset, got: chunk.offset });
        }

        if let Some(header) = chunk.first_chunk_header {
            self.kind = Some(header.payload_kind);
            self.declared_size = Some(PayloadSize::from_wire(header.total_size));
        } else if self.kind.is_none() {
            return Err(ProtocolError::MissingFirstChunkHeader);
        }

        if let Some(PayloadSize::Known(total)) = self.declared_size {
            let projected = self.expected_offset + chunk.body.len() as u64;
            if projected > total {
                return Err(ProtocolError::BodyExceedsDeclaredTotal { declared: total, got: projected });
            }
        }

        match &mut self.sink {
            Sink::Buffer(buf) => buf.extend_from_slice(&chunk.body),
            Sink::File(file) => {
                file.seek(SeekFrom::Start(self.expected_offset)).map_err(|_| ProtocolError::MissingFirstChunkHeader)?;
                file.write_all(&chunk.body).map_err(|_| ProtocolError::MissingFirstChunkHeader)?;
            }
        }
        self.expected_offset += chunk.body.len() as u64;

        if chunk.last_chunk {
            if let Sink::File(file) = &mut self.sink {
                let _ = file.sync_data();
            }
            let bytes = match &self.sink {
                Sink::Buffer(buf) => Some(buf.clone()),
                Sink::File(_) => None,
            };
            return Ok(AttachOutcome::Completed(CompletedPayload {
                id: self.id,
                kind: self.kind.unwrap_or(PayloadKind::Bytes),
                bytes,
            }));
        }
        Ok(AttachOutcome::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nearlink_core::frame::FirstChunkHeader;
    use bytes::Bytes;

    fn chunk(offset: u64, last: bool, header: Option<FirstChunkHeader>, body: &[u8]) -> PayloadChunk {
        PayloadChunk {
            payload_id: PayloadId::new(1),
            offset,
            last_chunk: last,
            first_chunk_header: header,
            body: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn in_order_chunks_reassemble_to_the_sent_bytes() {
        let mut payload = IncomingPayload::new(PayloadId::new(1));
        let header = FirstChunkHeader { payload_kind: PayloadKind::Bytes, total_size: 5 };
        payload.attach_chunk(&chunk(0, false, Some(header), b"he")).unwrap();
        let outcome = payload.attach_chunk(&chunk(2, true, None, b"llo")).unwrap();
        match outcome {
            AttachOutcome::Completed(completed) => assert_eq!(completed.bytes.unwrap(), b"hello"),
            AttachOutcome::InProgress => panic!("expected completion"),
        }
    }

    #[test]
    fn out_of_order_offset_is_rejected() {
        let mut payload = IncomingPayload::new(PayloadId::new(1));
        let header = FirstChunkHeader { payload_kind: PayloadKind::Bytes, total_size: 5 };
        payload.attach_chunk(&chunk(0, false, Some(header), b"he")).unwrap();
        let err = payload.attach_chunk(&chunk(3, true, None, b"llo")).unwrap_err();
        assert_eq!(err, ProtocolError::OffsetMismatch { expected: 2, got: 3 });
    }

    #[test]
    fn body_exceeding_declared_total_is_rejected() {
        let mut payload = IncomingPayload::new(PayloadId::new(1));
        let header = FirstChunkHeader { payload_kind: PayloadKind::Bytes, total_size: 2 };
        let err = payload.attach_chunk(&chunk(0, false, Some(header), b"toolong")).unwrap_err();
        assert_eq!(err, ProtocolError::BodyExceedsDeclaredTotal { declared: 2, got: 7 });
    }

    #[test]
    fn zero_length_payload_completes_on_first_empty_last_chunk() {
        let mut payload = IncomingPayload::new(PayloadId::new(1));
        let header = FirstChunkHeader { payload_kind: PayloadKind::Bytes, total_size: 0 };
        let outcome = payload.attach_chunk(&chunk(0, true, Some(header), b"")).unwrap();
        match outcome {
            AttachOutcome::Completed(completed) => assert_eq!(completed.bytes.unwrap(), Vec::<u8>::new()),
            AttachOutcome::InProgress => panic!("expected completion"),
        }
    }
}
