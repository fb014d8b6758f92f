//! `ClientProxy` (§3, §6): the per-local-session façade applications drive.
//! Wires `nearlink-transport`'s `PcpHandler`, `EndpointManager` and
//! `BwuManager` to a set of platform `Medium` drivers, the way `s2n-quic`'s
//! `Server`/`Client` wire `s2n-quic-transport`'s connection state to an
//! `io::Provider`.

use crate::listener::{ConnectionListener, DiscoveryListener};
use nearlink_core::bloom_filter::BloomFilter;
use nearlink_core::frame::{MediumParams, OfflineFrame};
use nearlink_core::payload::{PayloadId, PayloadKind, PayloadStatus};
use nearlink_core::{
    AdvertisingOptions, DiscoveryOptions, DisconnectReason, EndpointId, EndpointInfo, Medium as MediumKind, Status,
};
use nearlink_transport::bwu::BwuError;
use nearlink_transport::channel::EndpointChannel;
use nearlink_transport::channel_manager::EndpointChannelManager;
use nearlink_transport::internal_payload::OutgoingPayload;
use nearlink_transport::medium_driver::{DiscoveredEndpoint, IncomingConnection, Medium, MediumError, Socket, StopGuard};
use nearlink_transport::pcp::authentication::EcdhAuthenticator;
use nearlink_transport::pcp::PcpHandler;
use nearlink_transport::{EndpointManager, EndpointManagerConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

type BoxedSocket = Box<dyn Socket>;

#[derive(Default)]
struct Session {
    advertising_guards: Vec<Box<dyn StopGuard>>,
    discovery_guards: Vec<Box<dyn StopGuard>>,
    advertising_listener: Option<Arc<dyn ConnectionListener>>,
    connection_listeners: HashMap<EndpointId, Arc<dyn ConnectionListener>>,
    pending_incoming: HashMap<EndpointId, Arc<EndpointChannel<BoxedSocket>>>,
    discovered: HashMap<EndpointId, DiscoveredEndpoint>,
}

/// Per-session state: current strategy, discovered endpoints, registered
/// callbacks, local identity (§3 "ClientProxy"). One instance per
/// concurrent advertising/discovery session.
pub struct ClientProxy {
    local_endpoint_id: EndpointId,
    channel_manager: Arc<EndpointChannelManager<BoxedSocket>>,
    pcp: Arc<PcpHandler<BoxedSocket, EcdhAuthenticator>>,
    endpoint_manager: Arc<EndpointManager<BoxedSocket>>,
    bwu: Arc<nearlink_transport::bwu::BwuManager>,
    mediums: HashMap<MediumKind, Arc<dyn Medium>>,
    session: Mutex<Session>,
    found_filter: Mutex<BloomFilter>,
}

impl ClientProxy {
    pub fn new(mediums: HashMap<MediumKind, Arc<dyn Medium>>, config: EndpointManagerConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<ClientProxy>| {
            let channel_manager = Arc::new(EndpointChannelManager::new());
            let bwu = Arc::new(nearlink_transport::bwu::BwuManager::new(Arc::clone(&channel_manager), mediums.clone()));
            let pcp = Arc::new(PcpHandler::new(Arc::clone(&channel_manager), EcdhAuthenticator));
            let bridge: Arc<dyn nearlink_transport::Listener> = Arc::new(EndpointManagerBridge { client: weak.clone() });
            let endpoint_manager = Arc::new(EndpointManager::new(Arc::clone(&channel_manager), bridge, config));
            Self {
                local_endpoint_id: EndpointId::random(),
                channel_manager,
                pcp,
                endpoint_manager,
                bwu,
                mediums,
                session: Mutex::new(Session::default()),
                found_filter: Mutex::new(BloomFilter::with_capacity_bytes(1024)),
            }
        })
    }

    pub fn local_endpoint_id(&self) -> EndpointId {
        self.local_endpoint_id
    }

    /// Opens a radio advertiser per allowed medium (§6 `advertise`).
    pub fn advertise(
        self: &Arc<Self>,
        service_id: impl Into<String>,
        local_info: EndpointInfo,
        options: AdvertisingOptions,
        listener: Arc<dyn ConnectionListener>,
    ) -> Status {
        let service_id = service_id.into();
        let status = self.pcp.start_advertising(options.strategy());
        if status != Status::Ok {
            return status;
        }

        let mut session = self.session.lock();
        session.advertising_listener = Some(Arc::clone(&listener));
        for medium_kind in options.normalized_mediums().iter() {
            let Some(medium) = self.mediums.get(&medium_kind) else { continue };
            if !medium.is_available() {
                continue;
            }
            let client = Arc::clone(self);
            let on_incoming: Box<dyn Fn(IncomingConnection) + Send + Sync> =
                Box::new(move |incoming| client.handle_incoming(incoming));
            match medium.start_advertising(&service_id, &local_info, on_incoming) {
                Ok(guard) => session.advertising_guards.push(guard),
                Err(err) => tracing::warn!(?medium_kind, %err, "failed to start advertising on medium"),
            }
        }
        if session.advertising_guards.is_empty() {
            drop(session);
            self.pcp.stop_advertising();
            return Status::EndpointIoError;
        }
        Status::Ok
    }

    /// Idempotent (§8): stopping twice is a no-op.
    pub fn stop_advertising(&self) -> Status {
        let mut session = self.session.lock();
        for mut guard in session.advertising_guards.drain(..) {
            guard.stop();
        }
        session.advertising_listener = None;
        self.pcp.stop_advertising()
    }

    /// Opens a radio scanner per allowed medium (§6 `discover`).
    pub fn discover(
        self: &Arc<Self>,
        service_id: impl Into<String>,
        options: DiscoveryOptions,
        listener: Arc<dyn DiscoveryListener>,
    ) -> Status {
        let service_id = service_id.into();
        let status = self.pcp.start_discovery(options.strategy());
        if status != Status::Ok {
            return status;
        }

        let mut session = self.session.lock();
        for medium_kind in options.normalized_mediums().iter() {
            let Some(medium) = self.mediums.get(&medium_kind) else { continue };
            if !medium.is_available() {
                continue;
            }
            let found_client = Arc::clone(self);
            let found_listener = Arc::clone(&listener);
            let on_found: Box<dyn Fn(DiscoveredEndpoint) + Send + Sync> =
                Box::new(move |found| found_client.handle_found(found, &found_listener));
            let lost_client = Arc::clone(self);
            let lost_listener = Arc::clone(&listener);
            let on_lost: Box<dyn Fn(EndpointId) + Send + Sync> = Box::new(move |endpoint_id| {
                lost_client.session.lock().discovered.remove(&endpoint_id);
                lost_listener.on_endpoint_lost(endpoint_id);
            });
            match medium.start_discovery(&service_id, on_found, on_lost) {
                Ok(guard) => session.discovery_guards.push(guard),
                Err(err) => tracing::warn!(?medium_kind, %err, "failed to start discovery on medium"),
            }
        }
        if session.discovery_guards.is_empty() {
            drop(session);
            self.pcp.stop_discovery();
            return Status::EndpointIoError;
        }
        Status::Ok
    }

    pub fn stop_discovery(&self) -> Status {
        let mut session = self.session.lock();
        for mut guard in session.discovery_guards.drain(..) {
            guard.stop();
        }
        session.discovered.clear();
        self.pcp.stop_discovery()
    }

    /// Discoverer side (§6 `request_connection`): dials the endpoint's
    /// advertised medium, exchanges `CONNECTION_REQUEST`/`RESPONSE` and
    /// runs authentication.
    pub fn request_connection(&self, endpoint_id: EndpointId, local_info: EndpointInfo, listener: Arc<dyn ConnectionListener>) -> Status {
        let Some(discovered) = self.session.lock().discovered.get(&endpoint_id).cloned() else {
            return Status::EndpointUnknown;
        };
        let Some(medium) = self.mediums.get(&discovered.descriptor.medium) else {
            return Status::Error;
        };
        let socket = match medium.connect_to(&discovered.descriptor) {
            Ok(socket) => socket,
            Err(err) => {
                tracing::debug!(%err, "failed to dial discovered endpoint");
                return Status::EndpointIoError;
            }
        };
        let channel = Arc::new(EndpointChannel::new(socket));
        self.channel_manager.register(endpoint_id, Arc::clone(&channel));

        let nonce = rand::random::<i32>();
        let supported_mediums: Vec<MediumKind> = self.mediums.keys().copied().collect();
        let status = self.pcp.request_connection(endpoint_id, self.local_endpoint_id, &local_info, nonce, supported_mediums, &channel);
        if status == Status::Ok {
            self.session.lock().connection_listeners.insert(endpoint_id, Arc::clone(&listener));
            self.endpoint_manager.spawn(endpoint_id);
        } else {
            self.channel_manager.unregister(endpoint_id);
        }
        listener.on_connection_result(endpoint_id, status);
        status
    }

    /// Advertiser side (§6 `accept_connection`): accepts a pending
    /// `CONNECTION_REQUEST`, completes authentication, and hands the
    /// established channel to the endpoint manager.
    pub fn accept_connection(&self, endpoint_id: EndpointId, payload_listener: Arc<dyn ConnectionListener>) -> Status {
        let Some(channel) = self.session.lock().pending_incoming.get(&endpoint_id).cloned() else {
            return Status::EndpointUnknown;
        };
        let status = self.pcp.accept_connection(endpoint_id, &channel);
        if status == Status::Ok {
            let mut session = self.session.lock();
            session.pending_incoming.remove(&endpoint_id);
            session.connection_listeners.insert(endpoint_id, payload_listener);
            drop(session);
            self.endpoint_manager.spawn(endpoint_id);
        }
        status
    }

    pub fn reject_connection(&self, endpoint_id: EndpointId) -> Status {
        let Some(channel) = self.session.lock().pending_incoming.remove(&endpoint_id) else {
            return Status::EndpointUnknown;
        };
        self.pcp.reject_connection(endpoint_id, &channel)
    }

    /// Queues `payload` for each endpoint in `endpoint_ids` (§6
    /// `send_payload`, multicast).
    pub fn send_payload(&self, endpoint_ids: &[EndpointId], payload: Arc<OutgoingPayload>) -> Status {
        let mut last = Status::EndpointUnknown;
        for &endpoint_id in endpoint_ids {
            last = self.endpoint_manager.send_payload(endpoint_id, Arc::clone(&payload));
        }
        last
    }

    /// Cancels `payload_id` on every endpoint it is currently in flight to
    /// (§6 `cancel_payload` takes only the payload id, not an endpoint).
    pub fn cancel_payload(&self, payload_id: PayloadId) -> Status {
        let mut found = false;
        for endpoint_id in self.channel_manager.connected_endpoints() {
            if self.endpoint_manager.cancel_payload(endpoint_id, payload_id) == Status::Ok {
                found = true;
            }
        }
        if found {
            Status::Ok
        } else {
            Status::PayloadUnknown
        }
    }

    pub fn disconnect_from_endpoint(&self, endpoint_id: EndpointId) -> Status {
        if !self.endpoint_manager.is_connected(endpoint_id) {
            return Status::NotConnectedToEndpoint;
        }
        self.endpoint_manager.disconnect(endpoint_id);
        self.pcp.disconnect(endpoint_id);
        self.session.lock().connection_listeners.remove(&endpoint_id);
        Status::Ok
    }

    pub fn stop_all_endpoints(&self) {
        for endpoint_id in self.channel_manager.connected_endpoints() {
            self.disconnect_from_endpoint(endpoint_id);
        }
    }

    pub fn is_connected(&self, endpoint_id: EndpointId) -> bool {
        self.endpoint_manager.is_connected(endpoint_id)
    }

    /// Drives BWU's offer side for an already-established endpoint (§4.7).
    /// Not triggered automatically: bringing up a concrete upgrade-medium
    /// server needs driver-specific parameters (ssid/password/port) that
    /// `Medium::start_advertising` doesn't return, so the caller supplies
    /// `bring_up_server` itself rather than this crate fabricating one.
    pub fn request_bandwidth_upgrade(
        &self,
        endpoint_id: EndpointId,
        candidates: &[MediumKind],
        bring_up_server: impl Fn(&dyn Medium) -> Result<MediumParams, BwuError>,
    ) -> Result<MediumKind, BwuError> {
        let channel = self.channel_manager.get(endpoint_id).ok_or(BwuError::NoMediumAvailable)?;
        self.bwu.offer_upgrade(&channel, candidates, bring_up_server)
    }

    fn handle_incoming(self: &Arc<Self>, incoming: IncomingConnection) {
        let client = Arc::clone(self);
        std::thread::spawn(move || {
            let channel = Arc::new(EndpointChannel::new(incoming.socket));
            let frame = match channel.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    tracing::debug!(%err, "failed to read a connection request on an incoming socket");
                    return;
                }
            };
            let OfflineFrame::ConnectionRequest { endpoint_id, endpoint_info, .. } = frame else {
                tracing::warn!("incoming socket opened with something other than a connection request");
                channel.close();
                return;
            };
            client.channel_manager.register(endpoint_id, Arc::clone(&channel));
            let listener = {
                let mut session = client.session.lock();
                session.pending_incoming.insert(endpoint_id, channel);
                session.advertising_listener.clone()
            };
            if let Some(listener) = listener {
                listener.on_connection_initiated(endpoint_id, &endpoint_info);
            }
        });
    }

    fn handle_found(self: &Arc<Self>, found: DiscoveredEndpoint, listener: &Arc<dyn DiscoveryListener>) {
        let key = format!("{}:{:?}", found.endpoint_id, found.descriptor.medium);
        let already_seen = {
            let mut filter = self.found_filter.lock();
            let seen = filter.possibly_contains(&key);
            filter.insert(&key);
            seen
        };
        self.session.lock().discovered.insert(found.endpoint_id, found.clone());
        if !already_seen {
            listener.on_endpoint_found(found.endpoint_id, &found.endpoint_info, found.descriptor.medium);
        }
    }
}

/// Bridges `nearlink-transport`'s single global endpoint-manager listener
/// to whichever per-endpoint [`ConnectionListener`] the application
/// registered at `accept_connection`/`request_connection` time. Holds a
/// `Weak` back-reference so the `ClientProxy` <-> `EndpointManager` cycle
/// doesn't leak.
struct EndpointManagerBridge {
    client: Weak<ClientProxy>,
}

impl nearlink_transport::Listener for EndpointManagerBridge {
    fn on_payload_received(&self, endpoint_id: EndpointId, payload_id: PayloadId, kind: PayloadKind, bytes: Option<Vec<u8>>) {
        let Some(client) = self.client.upgrade() else { return };
        let listener = client.session.lock().connection_listeners.get(&endpoint_id).cloned();
        if let Some(listener) = listener {
            listener.on_payload_received(endpoint_id, payload_id, kind, bytes);
        }
    }

    fn on_payload_progress(&self, endpoint_id: EndpointId, payload_id: PayloadId, status: PayloadStatus, bytes_transferred: u64, total: Option<u64>) {
        let Some(client) = self.client.upgrade() else { return };
        let listener = client.session.lock().connection_listeners.get(&endpoint_id).cloned();
        if let Some(listener) = listener {
            listener.on_payload_progress(endpoint_id, payload_id, status, bytes_transferred, total);
        }
    }

    fn on_disconnected(&self, endpoint_id: EndpointId, reason: DisconnectReason) {
        let Some(client) = self.client.upgrade() else { return };
        let listener = client.session.lock().connection_listeners.remove(&endpoint_id);
        if let Some(listener) = listener {
            listener.on_disconnected(endpoint_id, reason);
        }
    }

    /// Responder side of BWU (§4.7 steps 3-6, §8 scenario 3). `PathAvailable`
    /// is the only variant that starts anything here: `Introduction`,
    /// `LastWrite` and `SafeToClose` are consumed by `accept_upgrade`'s and
    /// `complete_swap`'s own blocking reads on the new channel, never via
    /// this callback. Runs on its own thread, mirroring `handle_incoming`,
    /// since both calls block on socket I/O and must not stall the reader
    /// loop that invoked this callback.
    fn on_bandwidth_upgrade(&self, endpoint_id: EndpointId, message: nearlink_core::frame::BandwidthUpgradeNegotiation) {
        let nearlink_core::frame::BandwidthUpgradeNegotiation::PathAvailable { new_medium, params } = message else {
            return;
        };
        let Some(client) = self.client.upgrade() else { return };
        std::thread::spawn(move || {
            let Some(old) = client.channel_manager.get(endpoint_id) else {
                tracing::warn!(%endpoint_id, "received a bandwidth upgrade offer for an unknown endpoint");
                return;
            };
            let new = match client.bwu.accept_upgrade(endpoint_id, new_medium, &params) {
                Ok(channel) => channel,
                Err(err) => {
                    tracing::warn!(%err, %endpoint_id, "failed to accept bandwidth upgrade offer");
                    return;
                }
            };
            if let Err(err) = client.bwu.complete_swap(endpoint_id, &old, new, false) {
                tracing::warn!(%err, %endpoint_id, "failed to complete bandwidth upgrade swap");
            }
        });
    }
}

// `MediumError` is only used through the `Result` types above; re-exported
// here so downstream crates matching on it don't need a second import path.
pub use nearlink_transport::medium_driver::MediumError as ConnectError;
