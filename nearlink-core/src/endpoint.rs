//! Remote peer identity (§3 "Endpoint").

use crate::error::ValidationError;
use std::fmt;

/// Maximum size of an endpoint-info blob the §6 BLE advertisement / Bluetooth
/// device name packing can carry.
pub const MAX_ENDPOINT_INFO_LEN: usize = 131;

/// A remote peer's 4-character ASCII id.
///
/// Validated at construction so a malformed id can never reach the PCP
/// state machine or the wire, rather than surfacing as a `MalformedFrame`
/// deep in the codec.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointId([u8; 4]);

impl EndpointId {
    /// Builds an id from 4 raw ASCII bytes without validating printability.
    /// Used by the codec, which has already range-checked the bytes.
    pub(crate) fn from_raw(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        // ASCII was validated on construction.
        std::str::from_utf8(&self.0).unwrap_or("????")
    }

    /// Generates a random 4-character alphanumeric id, the way the
    /// advertiser side mints an id for a newly started advertising session.
    pub fn random() -> Self {
        use rand::Rng;
        const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
        let mut rng = rand::thread_rng();
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = ALPHABET[rng.gen_range(0..ALPHABET.len())];
        }
        Self(bytes)
    }
}

impl TryFrom<&str> for EndpointId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value.len() != 4 || !value.is_ascii() {
            return Err(ValidationError::InvalidEndpointId { len: value.len() });
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(value.as_bytes());
        Ok(Self(bytes))
    }
}

impl TryFrom<[u8; 4]> for EndpointId {
    type Error = ValidationError;

    fn try_from(bytes: [u8; 4]) -> Result<Self, Self::Error> {
        if !bytes.is_ascii() {
            return Err(ValidationError::InvalidEndpointId { len: 4 });
        }
        Ok(Self(bytes))
    }
}

impl fmt::Debug for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EndpointId").field(&self.as_str()).finish()
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque bytes naming a device, carried in CONNECTION_REQUEST and the
/// radio-specific advertisements (§6). Capped at [`MAX_ENDPOINT_INFO_LEN`]
/// bytes, validated pre-send per the §8 boundary behavior.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EndpointInfo(Vec<u8>);

impl EndpointInfo {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ValidationError> {
        let bytes = bytes.into();
        if bytes.len() > MAX_ENDPOINT_INFO_LEN {
            return Err(ValidationError::EndpointInfoTooLarge {
                len: bytes.len(),
                max: MAX_ENDPOINT_INFO_LEN,
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EndpointInfo({} bytes)", self.0.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_id_round_trips_through_str() {
        let id = EndpointId::try_from("E0AB").unwrap();
        assert_eq!(id.as_str(), "E0AB");
    }

    #[test]
    fn endpoint_id_rejects_wrong_length() {
        assert!(EndpointId::try_from("E0A").is_err());
        assert!(EndpointId::try_from("E0ABC").is_err());
    }

    #[test]
    fn endpoint_info_accepts_131_bytes_rejects_132() {
        assert!(EndpointInfo::new(vec![0u8; 131]).is_ok());
        assert!(EndpointInfo::new(vec![0u8; 132]).is_err());
    }
}
