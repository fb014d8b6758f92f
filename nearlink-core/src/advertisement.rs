//! Bit-exact wire formats for radio advertisements (§6).
//!
//! Grounded in `cpp/core_v2/internal/mediums/uuid.h` (name-based v3 UUIDs)
//! and the BLE/Bluetooth-name/Wi-Fi-LAN packing described in spec §6.

use crate::endpoint::{EndpointId, EndpointInfo, MAX_ENDPOINT_INFO_LEN};
use crate::error::ValidationError;
use crate::strategy::Strategy;
use sha2::{Digest, Sha256};

/// PCP id as packed into 5 bits of the BLE advertisement (§6). Constrained
/// to `0..=31`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcpId(u8);

impl PcpId {
    pub const MAX: u8 = 0b0001_1111;

    pub fn from_strategy(strategy: Strategy) -> Self {
        match strategy {
            Strategy::P2pStar => Self(1),
            Strategy::P2pCluster => Self(2),
            Strategy::P2pPointToPoint => Self(3),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// First 3 bytes of SHA-256(service_id), used as the BLE/Wi-Fi-LAN
/// service-id hash (§6).
pub fn service_id_hash(service_id: &str) -> Result<[u8; 3], ValidationError> {
    if service_id.is_empty() {
        return Err(ValidationError::EmptyServiceId);
    }
    let digest = Sha256::digest(service_id.as_bytes());
    let mut hash = [0u8; 3];
    hash.copy_from_slice(&digest[..3]);
    Ok(hash)
}

/// The Bonjour service type string for Wi-Fi LAN: `_{6 hex chars}._tcp.`.
pub fn wifi_lan_service_type(service_id: &str) -> Result<String, ValidationError> {
    let hash = service_id_hash(service_id)?;
    Ok(format!("_{}._tcp.", hex::encode(&hash[..]).chars().take(6).collect::<String>()))
}

/// BLE advertisement payload: version (3 bits) | pcp id (5 bits) | 4-byte
/// endpoint id | 3-byte service-id hash | endpoint-info (<=131 bytes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BleAdvertisement {
    pub version: u8,
    pub pcp: PcpId,
    pub endpoint_id: EndpointId,
    pub service_id_hash: [u8; 3],
    pub endpoint_info: EndpointInfo,
}

const BLE_VERSION_MASK: u8 = 0b1110_0000;
const BLE_PCP_MASK: u8 = 0b0001_1111;

impl BleAdvertisement {
    pub const CURRENT_VERSION: u8 = 0;

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 + 3 + self.endpoint_info.len());
        let header = ((self.version << 5) & BLE_VERSION_MASK) | (self.pcp.value() & BLE_PCP_MASK);
        out.push(header);
        out.extend_from_slice(self.endpoint_id.as_bytes());
        out.extend_from_slice(&self.service_id_hash);
        out.extend_from_slice(self.endpoint_info.as_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ValidationError> {
        if bytes.len() < 1 + 4 + 3 {
            return Err(ValidationError::InvalidEndpointId { len: bytes.len() });
        }
        let header = bytes[0];
        let version = (header & BLE_VERSION_MASK) >> 5;
        let pcp = PcpId(header & BLE_PCP_MASK);
        let mut id_bytes = [0u8; 4];
        id_bytes.copy_from_slice(&bytes[1..5]);
        let endpoint_id = EndpointId::try_from(id_bytes)?;
        let mut hash = [0u8; 3];
        hash.copy_from_slice(&bytes[5..8]);
        let endpoint_info = EndpointInfo::new(bytes[8..].to_vec())?;
        Ok(Self {
            version,
            pcp,
            endpoint_id,
            service_id_hash: hash,
            endpoint_info,
        })
    }
}

/// Total printable-character length cap for the Bluetooth Classic device
/// name encoding of the same packed info (§6): `<= 147` chars.
pub const MAX_BLUETOOTH_DEVICE_NAME_LEN: usize = 147;

/// Packs the same fields as [`BleAdvertisement`] into a printable-characters
/// Bluetooth device name (hex-encoded), used for discovery advertisement
/// over Bluetooth Classic.
pub fn bluetooth_device_name(adv: &BleAdvertisement) -> Result<String, ValidationError> {
    let encoded = hex::encode(adv.encode());
    if encoded.len() > MAX_BLUETOOTH_DEVICE_NAME_LEN {
        return Err(ValidationError::EndpointInfoTooLarge {
            len: encoded.len(),
            max: MAX_BLUETOOTH_DEVICE_NAME_LEN,
        });
    }
    Ok(encoded)
}

pub fn bluetooth_device_name_decode(name: &str) -> Result<BleAdvertisement, ValidationError> {
    let bytes = hex::decode(name).map_err(|_| ValidationError::InvalidEndpointId { len: name.len() })?;
    BleAdvertisement::decode(&bytes)
}

/// A 128-bit name-based (version 3) UUID, canonical textual form
/// `xxxxxxxx-xxxx-3xxx-yxxx-xxxxxxxxxxxx` (§6).
pub fn name_based_uuid(name: &str) -> uuid::Uuid {
    uuid::Uuid::new_v3(&uuid::Uuid::NAMESPACE_OID, name.as_bytes())
}

const _: () = assert!(MAX_ENDPOINT_INFO_LEN == 131);
