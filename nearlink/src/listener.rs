//! Application callback surface (§6 "Listeners").
//!
//! One `Listener` is registered per `advertise`/`discover` call and one
//! more per `request_connection`/`accept_connection` call, the way a
//! `ClientProxy` lets discovery and per-endpoint lifecycle callbacks differ
//! across calls. Every method has a no-op default so an application only
//! overrides the events it cares about.

use nearlink_core::payload::{PayloadId, PayloadKind, PayloadStatus};
use nearlink_core::{DisconnectReason, EndpointId, EndpointInfo, Medium, Status};

/// Discovery-session callbacks, registered via [`crate::ClientProxy::discover`].
pub trait DiscoveryListener: Send + Sync {
    fn on_endpoint_found(&self, _endpoint_id: EndpointId, _endpoint_info: &EndpointInfo, _medium: Medium) {}
    fn on_endpoint_lost(&self, _endpoint_id: EndpointId) {}
}

/// Per-endpoint connection lifecycle and payload callbacks.
///
/// `on_connection_initiated` fires once the peer's `CONNECTION_REQUEST` has
/// been read but before either side has decided to accept. A real pairing
/// UI would also display a short out-of-band verification code here; that
/// code would itself be derived from a crypto primitive the core only
/// *consumes* (§1 non-goal), so this build surfaces the endpoint info alone
/// and leaves the code display to the caller's own PAKE integration, if any.
pub trait ConnectionListener: Send + Sync {
    fn on_connection_initiated(&self, _endpoint_id: EndpointId, _endpoint_info: &EndpointInfo) {}
    fn on_connection_result(&self, _endpoint_id: EndpointId, _status: Status) {}
    fn on_disconnected(&self, _endpoint_id: EndpointId, _reason: DisconnectReason) {}
    fn on_payload_received(&self, _endpoint_id: EndpointId, _payload_id: PayloadId, _kind: PayloadKind, _bytes: Option<Vec<u8>>) {}
    fn on_payload_progress(
        &self,
        _endpoint_id: EndpointId,
        _payload_id: PayloadId,
        _status: PayloadStatus,
        _bytes_transferred: u64,
        _total: Option<u64>,
    ) {
    }
}
