//! Frame codec (§4.1, component A).
//!
//! Wire framing: each logical frame is `{u32 length BE, bytes payload}`;
//! `payload` is the tagged-union encoding of [`OfflineFrame`] below. The
//! length prefix covers the ciphertext once a channel has called
//! `enable_encryption`, the plaintext before — the length-prefix framing
//! itself (component A) is agnostic to that and lives in
//! [`crate::frame::codec`].

pub mod codec;

use crate::endpoint::{EndpointId, EndpointInfo};
use crate::error::CodecError;
use crate::medium::Medium;
use crate::payload::PayloadId;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// First byte of every encoded [`OfflineFrame`]. Bumped only on a wire
/// format change that isn't backward compatible.
pub const PROTOCOL_VERSION: u8 = 1;

type Tag = u8;

const TAG_CONNECTION_REQUEST: Tag = 0x01;
const TAG_CONNECTION_RESPONSE: Tag = 0x02;
const TAG_PAYLOAD_TRANSFER_DATA: Tag = 0x03;
const TAG_PAYLOAD_TRANSFER_CONTROL: Tag = 0x04;
const TAG_BWU_PATH_AVAILABLE: Tag = 0x05;
const TAG_BWU_LAST_WRITE: Tag = 0x06;
const TAG_BWU_SAFE_TO_CLOSE: Tag = 0x07;
const TAG_BWU_INTRODUCTION: Tag = 0x08;
const TAG_KEEP_ALIVE: Tag = 0x09;
const TAG_DISCONNECTION: Tag = 0x0a;

/// The tagged union of control frames carried over every endpoint channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfflineFrame {
    ConnectionRequest {
        endpoint_id: EndpointId,
        endpoint_info: EndpointInfo,
        nonce: i32,
        supported_mediums: Vec<Medium>,
    },
    ConnectionResponse {
        status: ConnectionResponseStatus,
    },
    PayloadTransfer(PayloadTransfer),
    BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation),
    KeepAlive,
    Disconnection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionResponseStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadTransfer {
    Data(PayloadChunk),
    Control(ControlMessage),
}

/// A unit of payload fragmentation (§3 "PayloadChunk"). `payload_type` and
/// `total_size` are only meaningful (and only encoded) on the first chunk
/// of a payload; later chunks carry `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadChunk {
    pub payload_id: PayloadId,
    pub offset: u64,
    pub last_chunk: bool,
    pub first_chunk_header: Option<FirstChunkHeader>,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstChunkHeader {
    pub payload_kind: crate::payload::PayloadKind,
    pub total_size: i64,
}

/// §3 "ControlMessage".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub payload_id: PayloadId,
    pub offset: u64,
    pub kind: ControlMessageKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessageKind {
    PayloadReceivedAck,
    PayloadCanceled,
    PayloadError,
}

/// §4.1, §4.7 bandwidth-upgrade negotiation sub-messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BandwidthUpgradeNegotiation {
    PathAvailable {
        new_medium: Medium,
        params: MediumParams,
    },
    LastWrite,
    SafeToClose,
    Introduction { endpoint_id: EndpointId },
}

/// Medium-specific connection parameters carried by `PATH_AVAILABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediumParams {
    WifiHotspot {
        ssid: String,
        password: String,
        port: u16,
    },
    WifiLan {
        service_name: String,
        port: u16,
    },
    WifiDirect {
        ssid: String,
        password: String,
        port: u16,
    },
    WebRtc {
        signaling_path: String,
    },
}

impl OfflineFrame {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        buf.put_u8(PROTOCOL_VERSION);
        match self {
            OfflineFrame::ConnectionRequest {
                endpoint_id,
                endpoint_info,
                nonce,
                supported_mediums,
            } => {
                buf.put_u8(TAG_CONNECTION_REQUEST);
                buf.put_slice(endpoint_id.as_bytes());
                put_bytes16(&mut buf, endpoint_info.as_bytes());
                buf.put_i32(*nonce);
                buf.put_u8(supported_mediums.len() as u8);
                for m in supported_mediums {
                    buf.put_u8(medium_to_wire(*m));
                }
            }
            OfflineFrame::ConnectionResponse { status } => {
                buf.put_u8(TAG_CONNECTION_RESPONSE);
                buf.put_u8(match status {
                    ConnectionResponseStatus::Accepted => 1,
                    ConnectionResponseStatus::Rejected => 0,
                });
            }
            OfflineFrame::PayloadTransfer(PayloadTransfer::Data(chunk)) => {
                buf.put_u8(TAG_PAYLOAD_TRANSFER_DATA);
                buf.put_i64(chunk.payload_id.value());
                buf.put_u64(chunk.offset);
                let mut flags = 0u8;
                if chunk.last_chunk {
                    flags |= 0b01;
                }
                if chunk.first_chunk_header.is_some() {
                    flags |= 0b10;
                }
                buf.put_u8(flags);
                if let Some(header) = chunk.first_chunk_header {
                    buf.put_u8(payload_kind_to_wire(header.payload_kind));
                    buf.put_i64(header.total_size);
                }
                buf.put_u32(chunk.body.len() as u32);
                buf.put_slice(&chunk.body);
            }
            OfflineFrame::PayloadTransfer(PayloadTransfer::Control(control)) => {
                buf.put_u8(TAG_PAYLOAD_TRANSFER_CONTROL);
                buf.put_i64(control.payload_id.value());
                buf.put_u64(control.offset);
                buf.put_u8(control_kind_to_wire(control.kind));
            }
            OfflineFrame::BandwidthUpgradeNegotiation(bwu) => encode_bwu(&mut buf, bwu),
            OfflineFrame::KeepAlive => buf.put_u8(TAG_KEEP_ALIVE),
            OfflineFrame::Disconnection => buf.put_u8(TAG_DISCONNECTION),
        }
        buf.freeze()
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self, CodecError> {
        let version = take_u8(&mut bytes)?;
        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion { found: version });
        }
        let tag = take_u8(&mut bytes)?;
        match tag {
            TAG_CONNECTION_REQUEST => {
                let mut id_bytes = [0u8; 4];
                take_slice(&mut bytes, &mut id_bytes)?;
                let endpoint_id = EndpointId::from_raw(id_bytes);
                let info_bytes = take_bytes16(&mut bytes)?;
                let endpoint_info = EndpointInfo::new(info_bytes)
                    .map_err(|_| CodecError::FieldTooLarge { field: "endpoint_info", max: 131 })?;
                let nonce = take_i32(&mut bytes)?;
                let medium_count = take_u8(&mut bytes)? as usize;
                let mut supported_mediums = Vec::with_capacity(medium_count);
                for _ in 0..medium_count {
                    supported_mediums.push(medium_from_wire(take_u8(&mut bytes)?)?);
                }
                Ok(OfflineFrame::ConnectionRequest {
                    endpoint_id,
                    endpoint_info,
                    nonce,
                    supported_mediums,
                })
            }
            TAG_CONNECTION_RESPONSE => {
                let status = match take_u8(&mut bytes)? {
                    1 => ConnectionResponseStatus::Accepted,
                    0 => ConnectionResponseStatus::Rejected,
                    _ => return Err(CodecError::MalformedFrame),
                };
                Ok(OfflineFrame::ConnectionResponse { status })
            }
            TAG_PAYLOAD_TRANSFER_DATA => {
                let payload_id = PayloadId::new(take_i64(&mut bytes)?);
                let offset = take_u64(&mut bytes)?;
                let flags = take_u8(&mut bytes)?;
                let last_chunk = flags & 0b01 != 0;
                let has_header = flags & 0b10 != 0;
                let first_chunk_header = if has_header {
                    let payload_kind = payload_kind_from_wire(take_u8(&mut bytes)?)?;
                    let total_size = take_i64(&mut bytes)?;
                    Some(FirstChunkHeader { payload_kind, total_size })
                } else {
                    None
                };
                let declared_len = take_u32(&mut bytes)?;
                if declared_len as usize != bytes.len() {
                    return Err(CodecError::ChunkSizeMismatch {
                        declared: declared_len,
                        actual: bytes.len() as u32,
                    });
                }
                let body = Bytes::copy_from_slice(bytes);
                Ok(OfflineFrame::PayloadTransfer(PayloadTransfer::Data(PayloadChunk {
                    payload_id,
                    offset,
                    last_chunk,
                    first_chunk_header,
                    body,
                })))
            }
            TAG_PAYLOAD_TRANSFER_CONTROL => {
                let payload_id = PayloadId::new(take_i64(&mut bytes)?);
                let offset = take_u64(&mut bytes)?;
                let kind = control_kind_from_wire(take_u8(&mut bytes)?)?;
                Ok(OfflineFrame::PayloadTransfer(PayloadTransfer::Control(ControlMessage {
                    payload_id,
                    offset,
                    kind,
                })))
            }
            TAG_BWU_PATH_AVAILABLE
            | TAG_BWU_LAST_WRITE
            | TAG_BWU_SAFE_TO_CLOSE
            | TAG_BWU_INTRODUCTION => decode_bwu(tag, &mut bytes).map(OfflineFrame::BandwidthUpgradeNegotiation),
            TAG_KEEP_ALIVE => Ok(OfflineFrame::KeepAlive),
            TAG_DISCONNECTION => Ok(OfflineFrame::Disconnection),
            _ => Err(CodecError::MalformedFrame),
        }
    }
}

fn encode_bwu(buf: &mut BytesMut, bwu: &BandwidthUpgradeNegotiation) {
    match bwu {
        BandwidthUpgradeNegotiation::PathAvailable { new_medium, params } => {
            buf.put_u8(TAG_BWU_PATH_AVAILABLE);
            buf.put_u8(medium_to_wire(*new_medium));
            match params {
                MediumParams::WifiHotspot { ssid, password, port }
                | MediumParams::WifiDirect { ssid, password, port } => {
                    buf.put_u8(if matches!(params, MediumParams::WifiHotspot { .. }) { 0 } else { 2 });
                    put_string16(buf, ssid);
                    put_string16(buf, password);
                    buf.put_u16(*port);
                }
                MediumParams::WifiLan { service_name, port } => {
                    buf.put_u8(1);
                    put_string16(buf, service_name);
                    buf.put_u16(*port);
                }
                MediumParams::WebRtc { signaling_path } => {
                    buf.put_u8(3);
                    put_string16(buf, signaling_path);
                }
            }
        }
        BandwidthUpgradeNegotiation::LastWrite => buf.put_u8(TAG_BWU_LAST_WRITE),
        BandwidthUpgradeNegotiation::SafeToClose => buf.put_u8(TAG_BWU_SAFE_TO_CLOSE),
        BandwidthUpgradeNegotiation::Introduction { endpoint_id } => {
            buf.put_u8(TAG_BWU_INTRODUCTION);
            buf.put_slice(endpoint_id.as_bytes());
        }
    }
}

fn decode_bwu(tag: Tag, bytes: &mut &[u8]) -> Result<BandwidthUpgradeNegotiation, CodecError> {
    match tag {
        TAG_BWU_PATH_AVAILABLE => {
            let new_medium = medium_from_wire(take_u8(bytes)?)?;
            let params = match take_u8(bytes)? {
                0 => MediumParams::WifiHotspot {
                    ssid: take_string16(bytes)?,
                    password: take_string16(bytes)?,
                    port: take_u16(bytes)?,
                },
                1 => MediumParams::WifiLan {
                    service_name: take_string16(bytes)?,
                    port: take_u16(bytes)?,
                },
                2 => MediumParams::WifiDirect {
                    ssid: take_string16(bytes)?,
                    password: take_string16(bytes)?,
                    port: take_u16(bytes)?,
                },
                3 => MediumParams::WebRtc {
                    signaling_path: take_string16(bytes)?,
                },
                _ => return Err(CodecError::MalformedFrame),
            };
            Ok(BandwidthUpgradeNegotiation::PathAvailable { new_medium, params })
        }
        TAG_BWU_LAST_WRITE => Ok(BandwidthUpgradeNegotiation::LastWrite),
        TAG_BWU_SAFE_TO_CLOSE => Ok(BandwidthUpgradeNegotiation::SafeToClose),
        TAG_BWU_INTRODUCTION => {
            let mut id_bytes = [0u8; 4];
            take_slice(bytes, &mut id_bytes)?;
            Ok(BandwidthUpgradeNegotiation::Introduction {
                endpoint_id: EndpointId::from_raw(id_bytes),
            })
        }
        _ => Err(CodecError::MalformedFrame),
    }
}

fn medium_to_wire(medium: Medium) -> u8 {
    match medium {
        Medium::Bluetooth => 0,
        Medium::Ble => 1,
        Medium::WifiLan => 2,
        Medium::WifiHotspot => 3,
        Medium::WifiDirect => 4,
        Medium::WebRtc => 5,
    }
}

fn medium_from_wire(value: u8) -> Result<Medium, CodecError> {
    match value {
        0 => Ok(Medium::Bluetooth),
        1 => Ok(Medium::Ble),
        2 => Ok(Medium::WifiLan),
        3 => Ok(Medium::WifiHotspot),
        4 => Ok(Medium::WifiDirect),
        5 => Ok(Medium::WebRtc),
        _ => Err(CodecError::MalformedFrame),
    }
}

fn payload_kind_to_wire(kind: crate::payload::PayloadKind) -> u8 {
    match kind {
        crate::payload::PayloadKind::Bytes => 0,
        crate::payload::PayloadKind::File => 1,
        crate::payload::PayloadKind::Stream => 2,
    }
}

fn payload_kind_from_wire(value: u8) -> Result<crate::payload::PayloadKind, CodecError> {
    match value {
        0 => Ok(crate::payload::PayloadKind::Bytes),
        1 => Ok(crate::payload::PayloadKind::File),
        2 => Ok(crate::payload::PayloadKind::Stream),
        _ => Err(CodecError::MalformedFrame),
    }
}

fn control_kind_to_wire(kind: ControlMessageKind) -> u8 {
    match kind {
        ControlMessageKind::PayloadReceivedAck => 0,
        ControlMessageKind::PayloadCanceled => 1,
        ControlMessageKind::PayloadError => 2,
    }
}

fn control_kind_from_wire(value: u8) -> Result<ControlMessageKind, CodecError> {
    match value {
        0 => Ok(ControlMessageKind::PayloadReceivedAck),
        1 => Ok(ControlMessageKind::PayloadCanceled),
        2 => Ok(ControlMessageKind::PayloadError),
        _ => Err(CodecError::MalformedFrame),
    }
}

fn put_bytes16(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_u16(bytes.len() as u16);
    buf.put_slice(bytes);
}

fn put_string16(buf: &mut BytesMut, s: &str) {
    put_bytes16(buf, s.as_bytes());
}

fn take_u8(bytes: &mut &[u8]) -> Result<u8, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(bytes.get_u8())
}

fn take_u16(bytes: &mut &[u8]) -> Result<u16, CodecError> {
    if bytes.len() < 2 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(bytes.get_u16())
}

fn take_i32(bytes: &mut &[u8]) -> Result<i32, CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(bytes.get_i32())
}

fn take_u32(bytes: &mut &[u8]) -> Result<u32, CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(bytes.get_u32())
}

fn take_i64(bytes: &mut &[u8]) -> Result<i64, CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(bytes.get_i64())
}

fn take_u64(bytes: &mut &[u8]) -> Result<u64, CodecError> {
    if bytes.len() < 8 {
        return Err(CodecError::UnexpectedEof);
    }
    Ok(bytes.get_u64())
}

fn take_slice(bytes: &mut &[u8], out: &mut [u8]) -> Result<(), CodecError> {
    if bytes.len() < out.len() {
        return Err(CodecError::UnexpectedEof);
    }
    bytes.copy_to_slice(out);
    Ok(())
}

fn take_bytes16(bytes: &mut &[u8]) -> Result<Vec<u8>, CodecError> {
    let len = take_u16(bytes)? as usize;
    if bytes.len() < len {
        return Err(CodecError::UnexpectedEof);
    }
    let out = bytes[..len].to_vec();
    bytes.advance(len);
    Ok(out)
}

fn take_string16(bytes: &mut &[u8]) -> Result<String, CodecError> {
    let raw = take_bytes16(bytes)?;
    String::from_utf8(raw).map_err(|_| CodecError::MalformedFrame)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frames() -> Vec<OfflineFrame> {
        vec![
            OfflineFrame::ConnectionRequest {
                endpoint_id: EndpointId::try_from("E0AB").unwrap(),
                endpoint_info: EndpointInfo::new(b"deviceA".to_vec()).unwrap(),
                nonce: 42,
                supported_mediums: vec![Medium::WifiLan, Medium::Bluetooth],
            },
            OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Accepted },
            OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Rejected },
            OfflineFrame::PayloadTransfer(PayloadTransfer::Data(PayloadChunk {
                payload_id: PayloadId::new(7),
                offset: 0,
                last_chunk: true,
                first_chunk_header: Some(FirstChunkHeader {
                    payload_kind: crate::payload::PayloadKind::Bytes,
                    total_size: 2,
                }),
                body: Bytes::from_static(b"hi"),
            })),
            OfflineFrame::PayloadTransfer(PayloadTransfer::Control(ControlMessage {
                payload_id: PayloadId::new(7),
                offset: 2,
                kind: ControlMessageKind::PayloadReceivedAck,
            })),
            OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::PathAvailable {
                new_medium: Medium::WifiHotspot,
                params: MediumParams::WifiHotspot {
                    ssid: "hotspot".into(),
                    password: "secret".into(),
                    port: 4242,
                },
            }),
            OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::LastWrite),
            OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::SafeToClose),
            OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::Introduction {
                endpoint_id: EndpointId::try_from("E0AB").unwrap(),
            }),
            OfflineFrame::KeepAlive,
            OfflineFrame::Disconnection,
        ]
    }

    #[test]
    fn encode_decode_is_identity() {
        for frame in sample_frames() {
            let encoded = frame.encode();
            let decoded = OfflineFrame::decode(&encoded).expect("decode");
            assert_eq!(frame, decoded);
        }
    }

    #[test]
    fn zero_length_bytes_payload_decodes() {
        let frame = OfflineFrame::PayloadTransfer(PayloadTransfer::Data(PayloadChunk {
            payload_id: PayloadId::new(1),
            offset: 0,
            last_chunk: true,
            first_chunk_header: Some(FirstChunkHeader {
                payload_kind: crate::payload::PayloadKind::Bytes,
                total_size: 0,
            }),
            body: Bytes::new(),
        }));
        let encoded = frame.encode();
        assert_eq!(OfflineFrame::decode(&encoded).unwrap(), frame);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut encoded = OfflineFrame::KeepAlive.encode().to_vec();
        encoded[0] = PROTOCOL_VERSION + 1;
        assert_eq!(
            OfflineFrame::decode(&encoded),
            Err(CodecError::UnsupportedVersion { found: PROTOCOL_VERSION + 1 })
        );
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let encoded = OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Accepted }.encode();
        assert_eq!(OfflineFrame::decode(&encoded[..1]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn chunk_size_mismatch_is_rejected() {
        let mut encoded = OfflineFrame::PayloadTransfer(PayloadTransfer::Data(PayloadChunk {
            payload_id: PayloadId::new(1),
            offset: 0,
            last_chunk: true,
            first_chunk_header: None,
            body: Bytes::from_static(b"hi"),
        }))
        .encode()
        .to_vec();
        // corrupt the declared body length (last 4 bytes before the 2-byte body are the u32 len)
        let len_pos = encoded.len() - 2 - 4;
        encoded[len_pos..len_pos + 4].copy_from_slice(&99u32.to_be_bytes());
        assert!(matches!(
            OfflineFrame::decode(&encoded),
            Err(CodecError::ChunkSizeMismatch { .. })
        ));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_endpoint_id() -> impl Strategy<Value = EndpointId> {
            "[A-Z0-9]{4}".prop_map(|s| EndpointId::try_from(s.as_str()).unwrap())
        }

        fn arb_endpoint_info() -> impl Strategy<Value = EndpointInfo> {
            proptest::collection::vec(any::<u8>(), 0..=crate::endpoint::MAX_ENDPOINT_INFO_LEN)
                .prop_map(|bytes| EndpointInfo::new(bytes).unwrap())
        }

        fn arb_medium() -> impl Strategy<Value = Medium> {
            prop_oneof![
                Just(Medium::Bluetooth),
                Just(Medium::Ble),
                Just(Medium::WifiLan),
                Just(Medium::WifiHotspot),
                Just(Medium::WifiDirect),
                Just(Medium::WebRtc),
            ]
        }

        fn arb_connection_request() -> impl Strategy<Value = OfflineFrame> {
            (
                arb_endpoint_id(),
                arb_endpoint_info(),
                any::<i32>(),
                proptest::collection::vec(arb_medium(), 0..6),
            )
                .prop_map(|(endpoint_id, endpoint_info, nonce, supported_mediums)| OfflineFrame::ConnectionRequest {
                    endpoint_id,
                    endpoint_info,
                    nonce,
                    supported_mediums,
                })
        }

        fn arb_data_chunk() -> impl Strategy<Value = OfflineFrame> {
            (any::<i64>(), any::<u64>(), any::<bool>(), proptest::collection::vec(any::<u8>(), 0..256)).prop_map(
                |(payload_id, offset, last_chunk, body)| {
                    OfflineFrame::PayloadTransfer(PayloadTransfer::Data(PayloadChunk {
                        payload_id: PayloadId::new(payload_id),
                        offset,
                        last_chunk,
                        first_chunk_header: None,
                        body: Bytes::from(body),
                    }))
                },
            )
        }

        proptest! {
            /// §8 "encode∘decode is identity on every well-formed
            /// OfflineFrame" — checked against arbitrary, not just the fixed
            /// sample set above, for the two variants with unbounded-size
            /// fields (endpoint info, chunk bodies) where a length-prefix
            /// off-by-one would only show up at certain sizes.
            #[test]
            fn connection_request_round_trips(frame in arb_connection_request()) {
                let encoded = frame.encode();
                prop_assert_eq!(OfflineFrame::decode(&encoded).unwrap(), frame);
            }

            #[test]
            fn data_chunk_round_trips(frame in arb_data_chunk()) {
                let encoded = frame.encode();
                prop_assert_eq!(OfflineFrame::decode(&encoded).unwrap(), frame);
            }
        }
    }
}
