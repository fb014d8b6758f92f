//! Peer-to-peer connection framework for short-range heterogeneous
//! wireless links.
//!
//! This crate is the thin application-facing layer: [`ClientProxy`] wires
//! `nearlink-transport`'s protocol state machines to a set of platform
//! `Medium` drivers, the way `s2n-quic` (the top-level crate) wires
//! `s2n-quic-transport`'s connection state to an `io::Provider` without
//! itself containing protocol logic.

pub mod builder;
pub mod client_proxy;
pub mod listener;

pub use builder::ClientProxyBuilder;
pub use client_proxy::ClientProxy;
pub use listener::{ConnectionListener, DiscoveryListener};

pub use nearlink_core::options::{AdvertisingOptions, DiscoveryOptions, MediumSet};
pub use nearlink_core::payload::{PayloadId, PayloadKind, PayloadSize, PayloadStatus};
pub use nearlink_core::{DisconnectReason, EndpointId, EndpointInfo, Medium, Status, Strategy};
pub use nearlink_transport::bwu::BwuError;
pub use nearlink_transport::internal_payload::OutgoingPayload;
pub use nearlink_transport::medium_driver::{
    DiscoveredEndpoint, EndpointDescriptor, IncomingConnection, MediumError, Socket, StopGuard,
};
pub use nearlink_transport::medium_driver::Medium as MediumDriver;
pub use nearlink_transport::EndpointManagerConfig;
