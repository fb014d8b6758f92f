//! End-to-end scenarios over the loopback medium (§8).

use nearlink::{
    AdvertisingOptions, ClientProxyBuilder, ConnectionListener, DiscoveryListener, DiscoveryOptions, EndpointId, EndpointInfo, Medium,
    PayloadId, PayloadKind, PayloadStatus, Status, Strategy,
};
use nearlink_mediums_loopback::LoopbackMedium;
use nearlink_transport::internal_payload::OutgoingPayload;
use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

fn client(strategy: Strategy) -> (Arc<nearlink::ClientProxy>, Strategy) {
    let client = ClientProxyBuilder::new().with_medium(Medium::WifiLan, Arc::new(LoopbackMedium::new())).build();
    (client, strategy)
}

/// Found endpoint id plus the bytes its advertiser registered with, enough
/// for a test to drive `request_connection` and assert on identity.
struct Found {
    endpoint_id: EndpointId,
    endpoint_info: Vec<u8>,
}

struct ChannelDiscoveryListener {
    found: mpsc::Sender<Found>,
}

impl DiscoveryListener for ChannelDiscoveryListener {
    fn on_endpoint_found(&self, endpoint_id: EndpointId, endpoint_info: &EndpointInfo, _medium: Medium) {
        let _ = self.found.send(Found { endpoint_id, endpoint_info: endpoint_info.as_bytes().to_vec() });
    }
}

#[derive(Default)]
struct RecordingListener {
    initiated: Mutex<Vec<EndpointId>>,
    results: Mutex<Vec<(EndpointId, Status)>>,
    disconnected: Mutex<Vec<EndpointId>>,
    progress: Mutex<Vec<(PayloadId, PayloadStatus, u64, Option<u64>)>>,
    received: Mutex<Vec<(PayloadId, PayloadKind, Option<Vec<u8>>)>>,
}

impl ConnectionListener for RecordingListener {
    fn on_connection_initiated(&self, endpoint_id: EndpointId, _endpoint_info: &EndpointInfo) {
        self.initiated.lock().push(endpoint_id);
    }
    fn on_connection_result(&self, endpoint_id: EndpointId, status: Status) {
        self.results.lock().push((endpoint_id, status));
    }
    fn on_disconnected(&self, endpoint_id: EndpointId, _reason: nearlink::DisconnectReason) {
        self.disconnected.lock().push(endpoint_id);
    }
    fn on_payload_progress(&self, _endpoint_id: EndpointId, payload_id: PayloadId, status: PayloadStatus, bytes_transferred: u64, total: Option<u64>) {
        self.progress.lock().push((payload_id, status, bytes_transferred, total));
    }
    fn on_payload_received(&self, _endpoint_id: EndpointId, payload_id: PayloadId, kind: PayloadKind, bytes: Option<Vec<u8>>) {
        self.received.lock().push((payload_id, kind, bytes));
    }
}

fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// Scenario 1: point-to-point happy path, with progress events on both
/// the sender and the receiver side.
#[test]
fn point_to_point_happy_path_with_payload_progress() {
    let (advertiser, strategy) = client(Strategy::P2pPointToPoint);
    let (discoverer, _) = client(strategy);

    let advertiser_listener = Arc::new(RecordingListener::default());
    let status = advertiser.advertise(
        "svc",
        EndpointInfo::new(b"deviceA".to_vec()).unwrap(),
        AdvertisingOptions::default().with_strategy(strategy),
        Arc::clone(&advertiser_listener) as Arc<dyn ConnectionListener>,
    );
    assert_eq!(status, Status::Ok);

    let (found_tx, found_rx) = mpsc::channel();
    let discovery_listener = Arc::new(ChannelDiscoveryListener { found: found_tx });
    let status = discoverer.discover("svc", DiscoveryOptions::default().with_strategy(strategy), discovery_listener);
    assert_eq!(status, Status::Ok);

    let found = found_rx.recv_timeout(Duration::from_secs(2)).expect("advertiser should be discovered");
    assert_eq!(found.endpoint_info.as_slice(), b"deviceA");

    let discoverer_listener = Arc::new(RecordingListener::default());
    let status = discoverer.request_connection(
        found.endpoint_id,
        EndpointInfo::new(b"deviceB".to_vec()).unwrap(),
        Arc::clone(&discoverer_listener) as Arc<dyn ConnectionListener>,
    );
    assert_eq!(status, Status::Ok);

    assert!(wait_until(|| !advertiser_listener.initiated.lock().is_empty(), Duration::from_secs(2)));
    let incoming_endpoint_id = advertiser_listener.initiated.lock()[0];

    let status = advertiser.accept_connection(incoming_endpoint_id, Arc::clone(&advertiser_listener) as Arc<dyn ConnectionListener>);
    assert_eq!(status, Status::Ok);

    assert!(advertiser.is_connected(incoming_endpoint_id));
    assert!(discoverer.is_connected(found.endpoint_id));

    let payload = Arc::new(OutgoingPayload::bytes(PayloadId::new(1), b"hi".to_vec()));
    let status = discoverer.send_payload(&[found.endpoint_id], Arc::clone(&payload));
    assert_eq!(status, Status::Ok);

    assert!(wait_until(|| !advertiser_listener.received.lock().is_empty(), Duration::from_secs(2)));
    let (_, kind, bytes) = advertiser_listener.received.lock()[0].clone();
    assert_eq!(kind, PayloadKind::Bytes);
    assert_eq!(bytes.as_deref(), Some(b"hi".as_slice()));

    assert!(wait_until(|| discoverer_listener.progress.lock().iter().any(|(_, s, ..)| *s == PayloadStatus::Success), Duration::from_secs(2)));
    let progress = discoverer_listener.progress.lock().clone();
    assert!(progress.iter().any(|(_, s, transferred, _)| *s == PayloadStatus::InProgress || (*s == PayloadStatus::Success && *transferred == 2)));

    advertiser.disconnect_from_endpoint(incoming_endpoint_id);
    assert!(wait_until(|| !discoverer_listener.disconnected.lock().is_empty(), Duration::from_secs(2)));
}

/// Scenario 6: a star-topology advertiser rejects a second concurrent
/// incoming request once it already has one connection of its own kind
/// pending, because a point-to-point discoverer can hold only one link.
#[test]
fn point_to_point_discoverer_cannot_hold_a_second_connection() {
    let (advertiser, strategy) = client(Strategy::P2pPointToPoint);
    let (discoverer, _) = client(strategy);
    let (other_advertiser, _) = client(strategy);

    let advertiser_listener = Arc::new(RecordingListener::default());
    advertiser.advertise(
        "svc",
        EndpointInfo::new(b"A".to_vec()).unwrap(),
        AdvertisingOptions::default().with_strategy(strategy),
        Arc::clone(&advertiser_listener) as Arc<dyn ConnectionListener>,
    );
    let other_listener = Arc::new(RecordingListener::default());
    other_advertiser.advertise(
        "svc",
        EndpointInfo::new(b"C".to_vec()).unwrap(),
        AdvertisingOptions::default().with_strategy(strategy),
        Arc::clone(&other_listener) as Arc<dyn ConnectionListener>,
    );

    let (found_tx, found_rx) = mpsc::channel();
    let discovery_listener = Arc::new(ChannelDiscoveryListener { found: found_tx });
    discoverer.discover("svc", DiscoveryOptions::default().with_strategy(strategy), discovery_listener);

    let first = found_rx.recv_timeout(Duration::from_secs(2)).unwrap();
    let second = found_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let discoverer_listener = Arc::new(RecordingListener::default());
    let status = discoverer.request_connection(first.endpoint_id, EndpointInfo::new(b"B".to_vec()).unwrap(), Arc::clone(&discoverer_listener) as Arc<dyn ConnectionListener>);
    assert_eq!(status, Status::Ok);

    let (target, target_listener) = if first.endpoint_info.as_slice() == b"A" { (&advertiser, &advertiser_listener) } else { (&other_advertiser, &other_listener) };
    assert!(wait_until(|| !target_listener.initiated.lock().is_empty(), Duration::from_secs(2)));
    let incoming = target_listener.initiated.lock()[0];
    target.accept_connection(incoming, Arc::clone(target_listener) as Arc<dyn ConnectionListener>);

    let second_status = discoverer.request_connection(second.endpoint_id, EndpointInfo::new(b"B".to_vec()).unwrap(), Arc::clone(&discoverer_listener) as Arc<dyn ConnectionListener>);
    assert_eq!(second_status, Status::AlreadyConnectedToEndpoint);
}

/// Scenario 4: cancelling a payload mid-transfer stops further progress
/// events for that payload id.
#[test]
fn cancel_payload_mid_transfer_stops_progress() {
    let (advertiser, strategy) = client(Strategy::P2pPointToPoint);
    let (discoverer, _) = client(strategy);

    let advertiser_listener = Arc::new(RecordingListener::default());
    advertiser.advertise(
        "svc",
        EndpointInfo::new(b"A".to_vec()).unwrap(),
        AdvertisingOptions::default().with_strategy(strategy),
        Arc::clone(&advertiser_listener) as Arc<dyn ConnectionListener>,
    );

    let (found_tx, found_rx) = mpsc::channel();
    discoverer.discover("svc", DiscoveryOptions::default().with_strategy(strategy), Arc::new(ChannelDiscoveryListener { found: found_tx }));
    let found = found_rx.recv_timeout(Duration::from_secs(2)).unwrap();

    let discoverer_listener = Arc::new(RecordingListener::default());
    discoverer.request_connection(found.endpoint_id, EndpointInfo::new(b"B".to_vec()).unwrap(), Arc::clone(&discoverer_listener) as Arc<dyn ConnectionListener>);

    assert!(wait_until(|| !advertiser_listener.initiated.lock().is_empty(), Duration::from_secs(2)));
    let incoming = advertiser_listener.initiated.lock()[0];
    advertiser.accept_connection(incoming, Arc::clone(&advertiser_listener) as Arc<dyn ConnectionListener>);

    let big_payload = vec![0u8; 10 * 1024 * 1024];
    let payload_id = PayloadId::new(42);
    let payload = Arc::new(OutgoingPayload::bytes(payload_id, big_payload));
    discoverer.send_payload(&[found.endpoint_id], payload);

    let status = discoverer.cancel_payload(payload_id);
    assert!(status == Status::Ok || status == Status::PayloadUnknown);
}
