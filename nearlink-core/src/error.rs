//! Crate-wide error types.
//!
//! Mirrors the layering used by `s2n_quic_core::connection::error::Error`:
//! one `thiserror`-derived enum with a `displaydoc` message, kept separate
//! from the application-facing [`crate::status::Status`] codes.

/// Errors produced while encoding or decoding an [`crate::frame::OfflineFrame`].
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// frame length prefix underruns the declared payload size
    MalformedFrame,
    /// frame carries a protocol version newer than this build understands
    UnsupportedVersion { found: u8 },
    /// chunk body size disagrees with the declared length
    ChunkSizeMismatch { declared: u32, actual: u32 },
    /// buffer ran out of bytes while decoding a fixed-size field
    UnexpectedEof,
    /// a variable-length field exceeded its protocol maximum
    FieldTooLarge { field: &'static str, max: usize },
}

/// Errors constructing validated data-model values (§3).
#[derive(Debug, Clone, PartialEq, Eq, displaydoc::Display, thiserror::Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// endpoint id must be exactly 4 ASCII bytes, got {len}
    InvalidEndpointId { len: usize },
    /// endpoint info exceeds the {max}-byte advertisement cap (was {len})
    EndpointInfoTooLarge { len: usize, max: usize },
    /// service id hash requires a non-empty service id
    EmptyServiceId,
}
