use super::{chunk_header_for, DetachedChunk};
use nearlink_core::payload::{PayloadId, PayloadKind, PayloadSize};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of [`OutgoingPayload::detach_next_chunk`].
#[derive(Debug)]
pub enum DetachOutcome {
    /// A chunk is ready to send; `last` on the chunk means no more follow.
    Chunk(DetachedChunk),
    /// Every chunk up to and including the LAST one was already sent.
    Exhausted,
    /// `cancel()` was called; the caller must emit `CONTROL{CANCELED}` and
    /// stop sending further chunks for this payload.
    Canceled,
}

enum Body {
    Bytes(Vec<u8>),
    File(File),
    Stream(Box<dyn Read + Send>),
}

struct State {
    offset: u64,
    header_sent: bool,
    finished: bool,
    body: Body,
}

/// A payload as seen by the writer loop (§4.5): a chunk producer over one
/// of the three payload shapes (§3, §9 "Generators").
pub struct OutgoingPayload {
    id: PayloadId,
    kind: PayloadKind,
    declared_size: PayloadSize,
    canceled: AtomicBool,
    state: Mutex<State>,
}

impl OutgoingPayload {
    pub fn bytes(id: PayloadId, body: Vec<u8>) -> Self {
        let declared_size = PayloadSize::Known(body.len() as u64);
        Self::new(id, PayloadKind::Bytes, declared_size, Body::Bytes(body))
    }

    pub fn file(id: PayloadId, mut file: File) -> io::Result<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        file.seek(SeekFrom::Start(0))?;
        Ok(Self::new(id, PayloadKind::File, PayloadSize::Known(len), Body::File(file)))
    }

    /// `reader` is a std, blocking producer (§9 "reader/writer loops are
    /// dedicated OS threads"), not an async stream.
    pub fn stream(id: PayloadId, reader: Box<dyn Read + Send>) -> Self {
        Self::new(id, PayloadKind::Stream, PayloadSize::Unknown, Body::Stream(reader))
    }

    fn new(id: PayloadId, kind: PayloadKind, declared_size: PayloadSize, body: Body) -> Self {
        Self {
            id,
            kind,
            declared_size,
            canceled: AtomicBool::new(false),
            state: Mutex::new(State { offset: 0, header_sent: false, finished: false, body }),
        }
    }

    pub fn id(&self) -> PayloadId {
        self.id
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub fn declared_size(&self) -> PayloadSize {
        self.declared_size
    }

    /// Sets the cancel flag; takes effect on the next `detach_next_chunk`
    /// call, matching §4.5's "stops after the current chunk" behavior —
    /// a chunk already mid-flight on the wire is not recalled.
    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }

    pub fn current_offset(&self) -> u64 {
        self.state.lock().offset
    }

    /// Returns the next chunk with a body of at most `max_body_size`, or
    /// [`DetachOutcome::Exhausted`] once the LAST chunk has already been
    /// produced.
    pub fn detach_next_chunk(&self, max_body_size: usize) -> io::Result<DetachOutcome> {
        if self.is_canceled() {
            return Ok(DetachOutcome::Canceled);
        }
        let mut state = self.state.lock();
        if state.finished {
            return Ok(DetachOutcome::Exhausted);
        }

        let header = if !state.header_sent {
            state.header_sent = true;
            Some(chunk_header_for(self.kind, self.declared_size))
        } else {
            None
        };

        let (body, last) = match &mut state.body {
            Body::Bytes(bytes) => {
                let start = state.offset as usize;
                let end = (start + max_body_size).min(bytes.len());
                let chunk = bytes[start..end].to_vec();
                (chunk, end == bytes.len())
            }
            Body::File(file) => {
                let mut buf = vec![0u8; max_body_size];
                let read = file.read(&mut buf)?;
                buf.truncate(read);
                let total = match self.declared_size {
                    PayloadSize::Known(n) => n,
                    PayloadSize::Unknown => unreachable!("file payloads always declare a size"),
                };
                (buf, state.offset + read as u64 >= total)
            }
            Body::Stream(reader) => {
                let mut buf = vec![0u8; max_body_size];
                let read = reader.read(&mut buf)?;
                buf.truncate(read);
                (buf, read == 0)
            }
        };

        let chunk = DetachedChunk {
            payload_id: self.id,
            offset: state.offset,
            last_chunk: last,
            first_chunk_header: header,
            body,
        };
        state.offset += chunk.body.len() as u64;
        state.finished = last;
        Ok(DetachOutcome::Chunk(chunk))
    }
}
