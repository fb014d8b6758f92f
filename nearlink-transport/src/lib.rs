//! Stateful connection engine for the nearlink offline connection stack:
//! endpoint channels, the PCP handshake, per-endpoint reader/writer loops
//! and bandwidth upgrade. `nearlink-core` supplies the wire types this
//! crate drives; `nearlink` (the top-level crate) wires it to a concrete
//! `ClientProxy` and a set of platform `Medium` drivers.

pub mod bwu;
pub mod channel;
pub mod channel_manager;
pub mod crypto;
pub mod endpoint_manager;
pub mod executor;
pub mod internal_payload;
pub mod medium_driver;
pub mod pcp;

pub use channel::{ChannelError, EndpointChannel, EndpointSocket};
pub use channel_manager::EndpointChannelManager;
pub use crypto::{CipherSuite, CryptoError, DirectionalKey};
pub use endpoint_manager::{EndpointManager, EndpointManagerConfig, Listener};
pub use medium_driver::{DiscoveredEndpoint, EndpointDescriptor, IncomingConnection, Medium, MediumError, Socket, StopGuard};
pub use pcp::{PcpHandler, PcpState, Role};
