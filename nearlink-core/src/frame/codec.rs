//! Length-prefixed framing: `{u32 length BE}{payload}`, used both for
//! plaintext control frames and, once a channel has enabled encryption, for
//! ciphertext records. Kept independent of [`super::OfflineFrame`] so the
//! same helpers can frame raw payload chunks too.

use std::io::{self, Read, Write};

/// Frames longer than this are rejected outright rather than allocating an
/// attacker/bug-controlled buffer size.
pub const MAX_FRAME_LEN: u32 = 32 * 1024 * 1024;

/// Reads one length-prefixed frame from `reader`, returning its raw bytes.
///
/// Blocks until the full frame has arrived or the stream ends, matching the
/// blocking-I/O model the endpoint channel reader thread runs under (§5).
pub fn read_frame<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_be_bytes(len_bytes);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds {MAX_FRAME_LEN}"),
        ));
    }
    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body)?;
    Ok(body)
}

/// Writes `payload` as one length-prefixed frame to `writer`.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> io::Result<()> {
    if payload.len() as u64 > MAX_FRAME_LEN as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("payload length {} exceeds {MAX_FRAME_LEN}", payload.len()),
        ));
    }
    writer.write_all(&(payload.len() as u32).to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn write_then_read_round_trips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).unwrap();
        assert_eq!(frame, b"hello");
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_LEN + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        assert!(read_frame(&mut cursor).is_err());
    }

    #[test]
    fn truncated_stream_is_an_error() {
        let mut cursor = Cursor::new(vec![0u8, 0, 0, 5, b'h', b'i']);
        assert!(read_frame(&mut cursor).is_err());
    }
}
