//! PCP handler (§4.6): strategy-specific lifecycle from advertise/discover
//! through authentication to an established, authenticated endpoint.

pub mod authentication;
pub mod topology;

use crate::channel::{EndpointChannel, EndpointSocket};
use crate::channel_manager::EndpointChannelManager;
use authentication::{AuthenticationError, Authenticator};
use nearlink_core::frame::{ConnectionResponseStatus, OfflineFrame};
use nearlink_core::{EndpointId, EndpointInfo, Medium, Status, Strategy};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use topology::ConnectionCounts;

/// Per-endpoint state, following the diagram in §4.6. Both roles
/// (advertiser and discoverer) use the same states with symmetric
/// transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcpState {
    Idle,
    Pending,
    WaitingLocalAccept,
    Authenticated,
    Established,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Advertiser,
    Discoverer,
}

struct EndpointRecord {
    role: Role,
    state: PcpState,
}

#[derive(Default)]
struct SessionState {
    strategy: Option<Strategy>,
    advertising: bool,
    discovering: bool,
}

/// Drives every endpoint through the §4.6 state machine for one local
/// session (one `ClientProxy`). Holds no socket/medium references itself —
/// those are supplied per call, matching §9's "dynamic dispatch over
/// medium drivers: composition, not inheritance".
pub struct PcpHandler<S, A> {
    session: Mutex<SessionState>,
    endpoints: Mutex<HashMap<EndpointId, EndpointRecord>>,
    channel_manager: Arc<EndpointChannelManager<S>>,
    authenticator: A,
}

impl<S: EndpointSocket, A: Authenticator> PcpHandler<S, A> {
    pub fn new(channel_manager: Arc<EndpointChannelManager<S>>, authenticator: A) -> Self {
        Self {
            session: Mutex::new(SessionState::default()),
            endpoints: Mutex::new(HashMap::new()),
            channel_manager,
            authenticator,
        }
    }

    pub fn start_advertising(&self, strategy: Strategy) -> Status {
        let mut session = self.session.lock();
        if session.advertising {
            return Status::AlreadyAdvertising;
        }
        if let Some(active) = session.strategy {
            if active != strategy {
                return Status::AlreadyHaveActiveStrategy;
            }
        }
        session.strategy = Some(strategy);
        session.advertising = true;
        Status::Ok
    }

    pub fn start_discovery(&self, strategy: Strategy) -> Status {
        let mut session = self.session.lock();
        if session.discovering {
            return Status::AlreadyDiscovering;
        }
        if let Some(active) = session.strategy {
            if active != strategy {
                return Status::AlreadyHaveActiveStrategy;
            }
        }
        session.strategy = Some(strategy);
        session.discovering = true;
        Status::Ok
    }

    /// Idempotent: stopping twice is a no-op returning `Ok` (§8).
    pub fn stop_advertising(&self) -> Status {
        let mut session = self.session.lock();
        session.advertising = false;
        if !session.advertising && !session.discovering {
            session.strategy = None;
        }
        Status::Ok
    }

    pub fn stop_discovery(&self) -> Status {
        let mut session = self.session.lock();
        session.discovering = false;
        if !session.advertising && !session.discovering {
            session.strategy = None;
        }
        Status::Ok
    }

    fn connection_counts(&self) -> ConnectionCounts {
        let endpoints = self.endpoints.lock();
        let mut counts = ConnectionCounts::default();
        for record in endpoints.values() {
            if record.state != PcpState::Established {
                continue;
            }
            match record.role {
                Role::Discoverer => counts.outgoing += 1,
                Role::Advertiser => counts.incoming += 1,
            }
        }
        counts
    }

    fn active_strategy(&self) -> Option<Strategy> {
        self.session.lock().strategy
    }

    /// Discoverer side (§4.6 `request_connection`): sends `CONNECTION_REQUEST`
    /// on `channel`, awaits `CONNECTION_RESPONSE`, then runs the
    /// authentication handshake. `channel` must already be registered with
    /// the channel manager by the caller.
    pub fn request_connection(
        &self,
        endpoint_id: EndpointId,
        local_endpoint_id: EndpointId,
        local_info: &EndpointInfo,
        nonce: i32,
        supported_mediums: Vec<Medium>,
        channel: &EndpointChannel<S>,
    ) -> Status {
        let Some(strategy) = self.active_strategy() else {
            return Status::OutOfOrderApiCall;
        };
        if !topology::can_send_outgoing(strategy, self.connection_counts()) {
            return Status::AlreadyConnectedToEndpoint;
        }
        {
            let mut endpoints = self.endpoints.lock();
            if endpoints.contains_key(&endpoint_id) {
                return Status::AlreadyConnectedToEndpoint;
            }
            endpoints.insert(endpoint_id, EndpointRecord { role: Role::Discoverer, state: PcpState::Pending });
        }

        if channel
            .write_frame(&OfflineFrame::ConnectionRequest {
                endpoint_id: local_endpoint_id,
                endpoint_info: local_info.clone(),
                nonce,
                supported_mediums,
            })
            .is_err()
        {
            self.fail(endpoint_id);
            return Status::EndpointIoError;
        }

        let response = match channel.read_frame() {
            Ok(frame) => frame,
            Err(_) => {
                self.fail(endpoint_id);
                return Status::EndpointIoError;
            }
        };
        match response {
            OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Accepted } => {}
            OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Rejected } => {
                self.fail(endpoint_id);
                return Status::ConnectionRejected;
            }
            _ => {
                self.fail(endpoint_id);
                return Status::Error;
            }
        }

        self.authenticate_and_establish(endpoint_id, channel, AuthRole::Initiator)
    }

    /// Advertiser side (§4.6 `accept_connection`). `channel` must have
    /// already received `CONNECTION_REQUEST`; this sends the acceptance,
    /// runs authentication, and installs encryption on success.
    pub fn accept_connection(&self, endpoint_id: EndpointId, channel: &EndpointChannel<S>) -> Status {
        let Some(strategy) = self.active_strategy() else {
            return Status::OutOfOrderApiCall;
        };
        if !topology::can_receive_incoming(strategy, self.connection_counts()) {
            return Status::AlreadyConnectedToEndpoint;
        }
        self.endpoints
            .lock()
            .entry(endpoint_id)
            .or_insert(EndpointRecord { role: Role::Advertiser, state: PcpState::WaitingLocalAccept });

        if channel
            .write_frame(&OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Accepted })
            .is_err()
        {
            self.fail(endpoint_id);
            return Status::EndpointIoError;
        }

        self.authenticate_and_establish(endpoint_id, channel, AuthRole::Responder)
    }

    pub fn reject_connection(&self, endpoint_id: EndpointId, channel: &EndpointChannel<S>) -> Status {
        let _ = channel.write_frame(&OfflineFrame::ConnectionResponse { status: ConnectionResponseStatus::Rejected });
        channel.close();
        self.endpoints.lock().remove(&endpoint_id);
        Status::Ok
    }

    fn authenticate_and_establish(&self, endpoint_id: EndpointId, channel: &EndpointChannel<S>, role: AuthRole) -> Status {
        let outcome: Result<_, AuthenticationError> = match role {
            AuthRole::Initiator => self.authenticator.initiate(channel),
            AuthRole::Responder => self.authenticator.respond(channel),
        };
        match outcome {
            Ok(cipher) => {
                channel.enable_encryption(cipher);
                if let Some(record) = self.endpoints.lock().get_mut(&endpoint_id) {
                    record.state = PcpState::Established;
                }
                Status::Ok
            }
            Err(_) => {
                self.fail(endpoint_id);
                channel.close();
                Status::EndpointIoError
            }
        }
    }

    fn fail(&self, endpoint_id: EndpointId) {
        if let Some(record) = self.endpoints.lock().get_mut(&endpoint_id) {
            record.state = PcpState::Closed;
        }
        self.channel_manager.unregister(endpoint_id);
    }

    pub fn state_of(&self, endpoint_id: EndpointId) -> Option<PcpState> {
        self.endpoints.lock().get(&endpoint_id).map(|r| r.state)
    }

    pub fn disconnect(&self, endpoint_id: EndpointId) {
        self.endpoints.lock().remove(&endpoint_id);
        self.channel_manager.unregister(endpoint_id);
    }
}

enum AuthRole {
    Initiator,
    Responder,
}
