//! Endpoint channel manager (§4.2): owns the live set of channels keyed by
//! endpoint id, and performs the atomic swap a bandwidth upgrade needs to
//! hand a connection from one medium's channel to another's without ever
//! exposing a half-migrated state to readers.

use crate::channel::EndpointChannel;
use nearlink_core::EndpointId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Thread-safe registry of active endpoint channels.
///
/// Grounded on the same "swap the whole entry under one lock" approach
/// `s2n_quic_dc::fixed_map` uses for its slot table, simplified to a plain
/// `HashMap` since the channel count here is bounded by the number of
/// connected peers rather than by a fixed packet-rate budget.
pub struct EndpointChannelManager<S> {
    channels: RwLock<HashMap<EndpointId, Arc<EndpointChannel<S>>>>,
}

impl<S> Default for EndpointChannelManager<S> {
    fn default() -> Self {
        Self { channels: RwLock::new(HashMap::new()) }
    }
}

impl<S> EndpointChannelManager<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, endpoint_id: EndpointId, channel: Arc<EndpointChannel<S>>) {
        self.channels.write().insert(endpoint_id, channel);
    }

    pub fn get(&self, endpoint_id: EndpointId) -> Option<Arc<EndpointChannel<S>>> {
        self.channels.read().get(&endpoint_id).cloned()
    }

    /// Atomically swaps in `new_channel` for `endpoint_id`, returning the
    /// channel it replaced (§4.7: the old medium's channel is paused, then
    /// closed, only after the new one is registered).
    pub fn replace(&self, endpoint_id: EndpointId, new_channel: Arc<EndpointChannel<S>>) -> Option<Arc<EndpointChannel<S>>> {
        self.channels.write().insert(endpoint_id, new_channel)
    }

    pub fn unregister(&self, endpoint_id: EndpointId) -> Option<Arc<EndpointChannel<S>>> {
        self.channels.write().remove(&endpoint_id)
    }

    pub fn connected_endpoints(&self) -> Vec<EndpointId> {
        self.channels.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
