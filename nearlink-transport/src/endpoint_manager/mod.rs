//! Endpoint manager (§4.5): per-endpoint reader and writer loops, payload
//! scheduling, keep-alive, disconnect. One instance per `ClientProxy`;
//! manages every endpoint the PCP handler has established.

use crate::channel::{ChannelError, EndpointChannel, EndpointSocket};
use crate::channel_manager::EndpointChannelManager;
use crate::executor::{BoundedExecutor, ScheduledTask};
use crate::internal_payload::{AttachOutcome, DetachOutcome, IncomingPayload, OutgoingPayload};
use nearlink_core::frame::{ControlMessage, ControlMessageKind, OfflineFrame, PayloadTransfer};
use nearlink_core::payload::{PayloadId, PayloadSize, PayloadStatus};
use nearlink_core::{DisconnectReason, EndpointId, Status};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Callbacks the endpoint manager drives (§6 listener surface, restricted
/// to the post-establishment events this module owns).
pub trait Listener: Send + Sync {
    fn on_payload_received(&self, endpoint_id: EndpointId, payload_id: PayloadId, kind: nearlink_core::payload::PayloadKind, bytes: Option<Vec<u8>>);
    fn on_payload_progress(&self, endpoint_id: EndpointId, payload_id: PayloadId, status: PayloadStatus, bytes_transferred: u64, total: Option<u64>);
    fn on_disconnected(&self, endpoint_id: EndpointId, reason: DisconnectReason);
    fn on_bandwidth_upgrade(&self, endpoint_id: EndpointId, message: nearlink_core::frame::BandwidthUpgradeNegotiation);
}

/// Tunable knobs from §4.5/§6; defaults match `nearlink_core::options`.
#[derive(Debug, Clone)]
pub struct EndpointManagerConfig {
    pub keep_alive_interval: Duration,
    pub keep_alive_timeout: Duration,
    pub max_chunk_body: usize,
    pub reader_workers: usize,
    pub writer_workers: usize,
    /// Where a FILE-kind incoming payload (§4.4 "partial writes are flushed
    /// to disk per chunk") is reassembled. Created on first use if missing.
    pub incoming_file_dir: PathBuf,
}

impl Default for EndpointManagerConfig {
    fn default() -> Self {
        Self {
            keep_alive_interval: Duration::from_millis(nearlink_core::options::DEFAULT_KEEP_ALIVE_INTERVAL_MS),
            keep_alive_timeout: Duration::from_millis(nearlink_core::options::DEFAULT_KEEP_ALIVE_TIMEOUT_MS),
            max_chunk_body: 64 * 1024,
            reader_workers: 4,
            writer_workers: 4,
            incoming_file_dir: std::env::temp_dir().join("nearlink-incoming"),
        }
    }
}

struct EndpointState {
    incoming: Mutex<HashMap<PayloadId, IncomingPayload>>,
    outgoing: Mutex<HashMap<PayloadId, Arc<OutgoingPayload>>>,
    queue: Mutex<VecDeque<PayloadId>>,
    queue_not_empty: Condvar,
    last_activity: Mutex<Instant>,
    finalized: AtomicBool,
}

impl EndpointState {
    fn new() -> Self {
        Self {
            incoming: Mutex::new(HashMap::new()),
            outgoing: Mutex::new(HashMap::new()),
            queue: Mutex::new(VecDeque::new()),
            queue_not_empty: Condvar::new(),
            last_activity: Mutex::new(Instant::now()),
            finalized: AtomicBool::new(false),
        }
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    fn enqueue_outgoing(&self, payload: Arc<OutgoingPayload>) {
        let id = payload.id();
        self.outgoing.lock().insert(id, payload);
        let mut queue = self.queue.lock();
        queue.push_back(id);
        self.queue_not_empty.notify_one();
    }
}

/// Endpoint bookkeeping shared by the reader, writer and keep-alive-monitor
/// closures. Kept separate from `EndpointState` so the monitor's
/// `ScheduledTask` (owned here, in `monitors`) never ends up reachable from
/// the state it ticks against — that would make dropping the state join the
/// monitor thread from inside its own tick.
#[derive(Default)]
struct Registry {
    endpoints: Mutex<HashMap<EndpointId, Arc<EndpointState>>>,
    monitors: Mutex<HashMap<EndpointId, ScheduledTask>>,
}

impl Registry {
    fn remove(&self, endpoint_id: EndpointId) {
        self.endpoints.lock().remove(&endpoint_id);
        self.monitors.lock().remove(&endpoint_id);
    }
}

/// Owns every connected endpoint's reader/writer loop pair (§4.5, §5: "a
/// shared, bounded multi-threaded executor for per-endpoint reader loops",
/// one each for readers and writers).
pub struct EndpointManager<S> {
    channel_manager: Arc<EndpointChannelManager<S>>,
    listener: Arc<dyn Listener>,
    registry: Arc<Registry>,
    reader_pool: BoundedExecutor,
    writer_pool: BoundedExecutor,
    config: EndpointManagerConfig,
}

impl<S: EndpointSocket + 'static> EndpointManager<S> {
    pub fn new(channel_manager: Arc<EndpointChannelManager<S>>, listener: Arc<dyn Listener>, config: EndpointManagerConfig) -> Self {
        Self {
            reader_pool: BoundedExecutor::new("nearlink-reader", config.reader_workers),
            writer_pool: BoundedExecutor::new("nearlink-writer", config.writer_workers),
            channel_manager,
            listener,
            registry: Arc::new(Registry::default()),
            config,
        }
    }

    /// Starts the reader and writer loops for a newly established endpoint.
    /// The channel must already be registered with the channel manager.
    pub fn spawn(&self, endpoint_id: EndpointId) {
        let Some(channel) = self.channel_manager.get(endpoint_id) else {
            return;
        };
        let state = Arc::new(EndpointState::new());
        self.registry.endpoints.lock().insert(endpoint_id, Arc::clone(&state));

        let reader_channel = Arc::clone(&channel);
        let reader_state = Arc::clone(&state);
        let reader_listener = Arc::clone(&self.listener);
        let reader_manager = Arc::clone(&self.channel_manager);
        let reader_registry = Arc::clone(&self.registry);
        let reader_config = self.config.clone();
        self.reader_pool.spawn(move || {
            let reason = run_reader(
                endpoint_id,
                &reader_channel,
                &reader_state,
                reader_listener.as_ref(),
                reader_config.keep_alive_timeout,
                &reader_config.incoming_file_dir,
            );
            if finalize(endpoint_id, reason, &reader_manager, &reader_state, reader_listener.as_ref()) {
                reader_registry.remove(endpoint_id);
            }
        });

        let writer_channel = Arc::clone(&channel);
        let writer_state = Arc::clone(&state);
        let writer_manager = Arc::clone(&self.channel_manager);
        let writer_listener = Arc::clone(&self.listener);
        let writer_registry = Arc::clone(&self.registry);
        let writer_config = self.config.clone();
        self.writer_pool.spawn(move || {
            let reason = run_writer(
                endpoint_id,
                &writer_channel,
                &writer_state,
                writer_listener.as_ref(),
                writer_config.keep_alive_interval,
                writer_config.max_chunk_body,
            );
            if finalize(endpoint_id, reason, &writer_manager, &writer_state, writer_listener.as_ref()) {
                writer_registry.remove(endpoint_id);
            }
        });

        // Independent of the reader loop, which can be parked inside a
        // blocking socket read when the peer goes silent and would
        // otherwise never notice the timeout (§4.5, §8 scenario 5). Never
        // touches `registry` itself: removing its own `ScheduledTask` entry
        // would join its own thread from inside its own tick.
        let monitor_state = Arc::clone(&state);
        let monitor_manager = Arc::clone(&self.channel_manager);
        let monitor_listener = Arc::clone(&self.listener);
        let keep_alive_timeout = self.config.keep_alive_timeout;
        let monitor = ScheduledTask::periodic(keep_alive_timeout, move || {
            if monitor_state.idle_for() > keep_alive_timeout {
                if let Some(channel) = monitor_manager.get(endpoint_id) {
                    channel.close();
                }
                finalize(endpoint_id, DisconnectReason::Timeout, &monitor_manager, &monitor_state, monitor_listener.as_ref());
            }
        });
        self.registry.monitors.lock().insert(endpoint_id, monitor);
    }

    /// Queues `payload` for delivery to `endpoint_id`. Returns
    /// `NotConnectedToEndpoint` if the endpoint isn't live.
    pub fn send_payload(&self, endpoint_id: EndpointId, payload: Arc<OutgoingPayload>) -> Status {
        let Some(state) = self.registry.endpoints.lock().get(&endpoint_id).cloned() else {
            return Status::NotConnectedToEndpoint;
        };
        state.enqueue_outgoing(payload);
        Status::Ok
    }

    pub fn cancel_payload(&self, endpoint_id: EndpointId, payload_id: PayloadId) -> Status {
        let Some(state) = self.registry.endpoints.lock().get(&endpoint_id).cloned() else {
            return Status::NotConnectedToEndpoint;
        };
        match state.outgoing.lock().get(&payload_id) {
            Some(payload) => {
                payload.cancel();
                Status::Ok
            }
            None => Status::PayloadUnknown,
        }
    }

    pub fn disconnect(&self, endpoint_id: EndpointId) {
        if let Some(channel) = self.channel_manager.get(endpoint_id) {
            channel.close();
        }
        let state = self.registry.endpoints.lock().get(&endpoint_id).cloned();
        if let Some(state) = state {
            if finalize(endpoint_id, DisconnectReason::LocalRequest, self.channel_manager.as_ref(), &state, self.listener.as_ref()) {
                self.registry.remove(endpoint_id);
            }
        }
    }

    pub fn is_connected(&self, endpoint_id: EndpointId) -> bool {
        self.registry.endpoints.lock().contains_key(&endpoint_id)
    }
}

/// Runs until the channel closes, a keep-alive-driven disconnect request is
/// observed, or a protocol violation occurs. Never panics (§7): every
/// failure becomes a [`DisconnectReason`].
fn run_reader<S: EndpointSocket>(
    endpoint_id: EndpointId,
    channel: &EndpointChannel<S>,
    state: &EndpointState,
    listener: &dyn Listener,
    keep_alive_timeout: Duration,
    incoming_file_dir: &Path,
) -> DisconnectReason {
    let _span = tracing::info_span!("endpoint", id = %endpoint_id, role = "reader").entered();
    loop {
        if state.idle_for() > keep_alive_timeout {
            return DisconnectReason::Timeout;
        }
        let frame = match channel.read_frame() {
            Ok(frame) => frame,
            Err(ChannelError::Closed) => return DisconnectReason::LocalRequest,
            Err(err) => {
                tracing::debug!(%err, "reader loop observed a channel error");
                return DisconnectReason::EndpointIoError;
            }
        };
        state.touch();

        match frame {
            OfflineFrame::PayloadTransfer(PayloadTransfer::Data(chunk)) => {
                let mut incoming = state.incoming.lock();
                let payload = incoming.entry(chunk.payload_id).or_insert_with(|| {
                    new_incoming_payload(chunk.payload_id, chunk.first_chunk_header, incoming_file_dir)
                });
                match payload.attach_chunk(&chunk) {
                    Ok(AttachOutcome::InProgress) => {
                        let transferred = payload.current_offset();
                        listener.on_payload_progress(endpoint_id, chunk.payload_id, PayloadStatus::InProgress, transferred, None);
                    }
                    Ok(AttachOutcome::Completed(completed)) => {
                        let transferred = completed.bytes.as_ref().map(|b| b.len() as u64).unwrap_or(0);
                        incoming.remove(&chunk.payload_id);
                        drop(incoming);
                        listener.on_payload_received(endpoint_id, completed.id, completed.kind, completed.bytes);
                        listener.on_payload_progress(endpoint_id, chunk.payload_id, PayloadStatus::Success, transferred, Some(transferred));
                    }
                    Err(err) => {
                        tracing::warn!(%err, "protocol error attaching payload chunk");
                        return DisconnectReason::Protocol;
                    }
                }
            }
            OfflineFrame::PayloadTransfer(PayloadTransfer::Control(control)) => {
                apply_control(endpoint_id, control, state, listener);
            }
            OfflineFrame::KeepAlive => {}
            OfflineFrame::BandwidthUpgradeNegotiation(message) => {
                listener.on_bandwidth_upgrade(endpoint_id, message);
            }
            OfflineFrame::Disconnection => return DisconnectReason::RemoteRequest,
            OfflineFrame::ConnectionRequest { .. } | OfflineFrame::ConnectionResponse { .. } => {
                tracing::warn!("connection-phase frame arrived on an established endpoint");
                return DisconnectReason::Protocol;
            }
        }
    }
}

/// Picks the reassembly sink for a freshly seen payload (§4.4 "FILE type ...
/// partial writes are flushed to disk per chunk"). A FILE-kind first chunk
/// routes to a file under `incoming_file_dir`; anything else buffers in
/// memory as before. Falls back to the in-memory sink if the directory or
/// file can't be created, rather than dropping the connection over it.
fn new_incoming_payload(payload_id: PayloadId, first_chunk_header: Option<nearlink_core::frame::FirstChunkHeader>, incoming_file_dir: &Path) -> IncomingPayload {
    let buffered = IncomingPayload::new(payload_id);
    let Some(header) = first_chunk_header else {
        return buffered;
    };
    if header.payload_kind != nearlink_core::payload::PayloadKind::File {
        return buffered;
    }
    if let Err(err) = std::fs::create_dir_all(incoming_file_dir) {
        tracing::warn!(%err, ?incoming_file_dir, "could not create incoming file directory, buffering in memory instead");
        return buffered;
    }
    let path = incoming_file_dir.join(payload_id.to_string());
    match std::fs::OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(file) => buffered.into_file(file),
        Err(err) => {
            tracing::warn!(%err, ?path, "could not open incoming file, buffering in memory instead");
            buffered
        }
    }
}

fn apply_control(endpoint_id: EndpointId, control: ControlMessage, state: &EndpointState, listener: &dyn Listener) {
    match control.kind {
        ControlMessageKind::PayloadCanceled => {
            if let Some(payload) = state.outgoing.lock().get(&control.payload_id) {
                payload.cancel();
            }
            if let Some(payload) = state.incoming.lock().get_mut(&control.payload_id) {
                payload.cancel();
            }
            listener.on_payload_progress(endpoint_id, control.payload_id, PayloadStatus::Canceled, control.offset, None);
        }
        ControlMessageKind::PayloadReceivedAck => {
            listener.on_payload_progress(endpoint_id, control.payload_id, PayloadStatus::InProgress, control.offset, None);
        }
        ControlMessageKind::PayloadError => {
            listener.on_payload_progress(endpoint_id, control.payload_id, PayloadStatus::Failure, control.offset, None);
        }
    }
}

/// Drains the outgoing queue round-robin, one chunk per payload per turn
/// (§4.5 "per-payload chunk budget"), and emits periodic keep-alives while
/// idle.
fn run_writer<S: EndpointSocket>(
    endpoint_id: EndpointId,
    channel: &EndpointChannel<S>,
    state: &EndpointState,
    listener: &dyn Listener,
    keep_alive_interval: Duration,
    max_chunk_body: usize,
) -> DisconnectReason {
    let _span = tracing::info_span!("endpoint", id = %endpoint_id, role = "writer").entered();
    loop {
        let next = {
            let mut queue = state.queue.lock();
            if queue.is_empty() {
                let result = state.queue_not_empty.wait_for(&mut queue, keep_alive_interval);
                if result.timed_out() && queue.is_empty() {
                    if let Err(err) = channel.write_frame(&OfflineFrame::KeepAlive) {
                        tracing::debug!(%err, "writer loop failed to send keep-alive");
                        return DisconnectReason::EndpointIoError;
                    }
                    continue;
                }
            }
            queue.pop_front()
        };
        let Some(payload_id) = next else { continue };

        let Some(payload) = state.outgoing.lock().get(&payload_id).cloned() else { continue };
        let outcome = match payload.detach_next_chunk(max_chunk_body) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(%err, "failed reading outgoing payload body");
                return DisconnectReason::EndpointIoError;
            }
        };

        match outcome {
            DetachOutcome::Chunk(chunk) => {
                let last = chunk.last_chunk;
                let transferred = chunk.offset + chunk.body.len() as u64;
                let total = match payload.declared_size() {
                    PayloadSize::Known(n) => Some(n),
                    PayloadSize::Unknown => None,
                };
                let frame = OfflineFrame::PayloadTransfer(PayloadTransfer::Data(chunk.into()));
                if let Err(err) = channel.write_frame(&frame) {
                    tracing::debug!(%err, "writer loop failed to send a data chunk");
                    return DisconnectReason::EndpointIoError;
                }
                let status = if last { PayloadStatus::Success } else { PayloadStatus::InProgress };
                listener.on_payload_progress(endpoint_id, payload_id, status, transferred, total);
                if last {
                    state.outgoing.lock().remove(&payload_id);
                } else {
                    let mut queue = state.queue.lock();
                    queue.push_back(payload_id);
                }
            }
            DetachOutcome::Exhausted => {
                state.outgoing.lock().remove(&payload_id);
            }
            DetachOutcome::Canceled => {
                state.outgoing.lock().remove(&payload_id);
                let control = ControlMessage { payload_id, offset: payload.current_offset(), kind: ControlMessageKind::PayloadCanceled };
                let _ = channel.write_frame(&OfflineFrame::PayloadTransfer(PayloadTransfer::Control(control)));
            }
        }
    }
}

/// Tears down an endpoint exactly once, whichever of the reader/writer/
/// keep-alive-monitor paths observes the failure first (§7 "reader/writer
/// loops never panic ... convert every error into a disconnect"). Returns
/// whether this call performed the teardown, so the caller knows whether
/// it is the one responsible for removing the endpoint's bookkeeping.
fn finalize<S>(
    endpoint_id: EndpointId,
    reason: DisconnectReason,
    channel_manager: &EndpointChannelManager<S>,
    state: &EndpointState,
    listener: &dyn Listener,
) -> bool {
    if state.finalized.swap(true, Ordering::SeqCst) {
        return false;
    }
    if let Some(channel) = channel_manager.get(endpoint_id) {
        channel.close();
    }
    channel_manager.unregister(endpoint_id);

    for (payload_id, payload) in state.outgoing.lock().drain() {
        listener.on_payload_progress(endpoint_id, payload_id, PayloadStatus::Failure, payload.current_offset(), None);
    }
    for (payload_id, payload) in state.incoming.lock().drain() {
        listener.on_payload_progress(endpoint_id, payload_id, PayloadStatus::Failure, payload.current_offset(), None);
    }
    listener.on_disconnected(endpoint_id, reason);
    true
}
