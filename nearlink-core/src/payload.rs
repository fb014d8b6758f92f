//! Application payload identity and shape (§3 "InternalPayload").

use rand::RngCore;

/// Signed 64-bit random payload identifier (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadId(i64);

impl PayloadId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn random() -> Self {
        Self(rand::thread_rng().next_u64() as i64)
    }

    pub fn value(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for PayloadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of an application-visible payload (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    Bytes,
    File,
    Stream,
}

/// Declared total size of a payload. `Known` is used for BYTES/FILE,
/// `Unknown` (the wire's `-1`) for STREAM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSize {
    Known(u64),
    Unknown,
}

impl PayloadSize {
    /// Encodes per §3: `>= 0` for known sizes, `-1` for unknown/STREAM.
    pub fn to_wire(self) -> i64 {
        match self {
            PayloadSize::Known(n) => n as i64,
            PayloadSize::Unknown => -1,
        }
    }

    pub fn from_wire(value: i64) -> Self {
        if value < 0 {
            PayloadSize::Unknown
        } else {
            PayloadSize::Known(value as u64)
        }
    }
}

/// Delivery outcome of a payload transfer, surfaced via
/// `on_payload_progress` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadStatus {
    InProgress,
    Success,
    Failure,
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_size_wire_round_trip() {
        assert_eq!(PayloadSize::from_wire(PayloadSize::Known(42).to_wire()), PayloadSize::Known(42));
        assert_eq!(PayloadSize::from_wire(PayloadSize::Unknown.to_wire()), PayloadSize::Unknown);
        assert_eq!(PayloadSize::Unknown.to_wire(), -1);
    }
}
