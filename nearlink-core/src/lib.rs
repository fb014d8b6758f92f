//! Wire model, data types and frame codec for the nearlink offline
//! connection engine. No I/O, threading or medium drivers live here — see
//! `nearlink-transport` for the stateful engine built on top of these types.

pub mod advertisement;
pub mod bloom_filter;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod medium;
pub mod options;
pub mod payload;
pub mod status;
pub mod strategy;

pub use endpoint::{EndpointId, EndpointInfo};
pub use error::{CodecError, ValidationError};
pub use frame::OfflineFrame;
pub use medium::Medium;
pub use options::{AdvertisingOptions, DiscoveryOptions};
pub use payload::{PayloadId, PayloadKind, PayloadSize, PayloadStatus};
pub use status::{DisconnectReason, Status};
pub use strategy::Strategy;
