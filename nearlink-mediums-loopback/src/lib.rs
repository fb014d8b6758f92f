//! Reference `Medium`/`Socket` driver over TCP loopback sockets.
//!
//! Platform radio drivers are explicitly out of scope for the core crates,
//! but the test suite still needs *something* concrete to drive two
//! `ClientProxy`s against end to end, the way `s2n-quic-platform`'s
//! `io-testing` feature backs `s2n-quic`'s own test suite with a runnable
//! socket provider instead of a real NIC.
//!
//! Advertising and discovery are brokered through a process-wide registry
//! keyed by service id; each [`LoopbackMedium`] gets its own id so two
//! instances in the same test process (standing in for two separate
//! devices) never discover their own advertisement.

use nearlink_core::endpoint::EndpointInfo;
use nearlink_core::{EndpointId, Medium as MediumKind};
use nearlink_transport::medium_driver::{
    DiscoveredEndpoint, EndpointDescriptor, IncomingConnection, Medium, MediumError, Socket, StopGuard,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

static NEXT_MEDIUM_ID: AtomicU64 = AtomicU64::new(1);

/// How often a discovery loop polls the registry for new/vanished
/// advertisements. There is no push notification on loopback TCP, so this
/// stands in for the radio scan interval a real driver would have.
const DISCOVERY_POLL_INTERVAL: Duration = Duration::from_millis(50);

const MTU: usize = 256 * 1024;

#[derive(Clone)]
struct Advertisement {
    medium_id: u64,
    endpoint_id: EndpointId,
    endpoint_info: EndpointInfo,
    addr: SocketAddr,
}

fn registry() -> &'static Mutex<HashMap<String, Vec<Advertisement>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<String, Vec<Advertisement>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A duplex TCP stream wrapped to satisfy [`Socket`].
pub struct LoopbackSocket(TcpStream);

impl Read for LoopbackSocket {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for LoopbackSocket {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Socket for LoopbackSocket {
    fn max_transmission_unit(&self) -> usize {
        MTU
    }
    fn close(&mut self) {
        let _ = self.0.shutdown(Shutdown::Both);
    }
    fn shutdown_handle(&self) -> Box<dyn Fn() + Send + Sync> {
        match self.0.try_clone() {
            Ok(clone) => Box::new(move || {
                let _ = clone.shutdown(Shutdown::Both);
            }),
            Err(_) => Box::new(|| {}),
        }
    }
}

struct AdvertisingGuard {
    service_id: String,
    medium_id: u64,
    stopped: Arc<AtomicBool>,
    accept_addr: SocketAddr,
}

impl StopGuard for AdvertisingGuard {
    fn stop(&mut self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        // unblocks the accept loop's blocking `accept()` call.
        let _ = TcpStream::connect(self.accept_addr);
        if let Some(ads) = registry().lock().get_mut(&self.service_id) {
            ads.retain(|a| a.medium_id != self.medium_id);
        }
    }
}

impl Drop for AdvertisingGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

struct DiscoveryGuard {
    stopped: Arc<AtomicBool>,
}

impl StopGuard for DiscoveryGuard {
    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

impl Drop for DiscoveryGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One loopback-TCP `Medium` instance, standing in for a single physical
/// radio on one simulated device.
pub struct LoopbackMedium {
    id: u64,
}

impl Default for LoopbackMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackMedium {
    pub fn new() -> Self {
        Self { id: NEXT_MEDIUM_ID.fetch_add(1, Ordering::SeqCst) }
    }
}

impl Medium for LoopbackMedium {
    fn kind(&self) -> MediumKind {
        MediumKind::WifiLan
    }

    fn is_available(&self) -> bool {
        true
    }

    fn start_advertising(
        &self,
        service_id: &str,
        endpoint_info: &EndpointInfo,
        on_incoming: Box<dyn Fn(IncomingConnection) + Send + Sync>,
    ) -> Result<Box<dyn StopGuard>, MediumError> {
        let listener = TcpListener::bind("127.0.0.1:0").map_err(MediumError::Io)?;
        let addr = listener.local_addr().map_err(MediumError::Io)?;
        let endpoint_id = EndpointId::random();

        registry().lock().entry(service_id.to_string()).or_default().push(Advertisement {
            medium_id: self.id,
            endpoint_id,
            endpoint_info: endpoint_info.clone(),
            addr,
        });

        let stopped = Arc::new(AtomicBool::new(false));
        let loop_stopped = Arc::clone(&stopped);
        std::thread::spawn(move || {
            for stream in listener.incoming() {
                if loop_stopped.load(Ordering::SeqCst) {
                    break;
                }
                let Ok(stream) = stream else { continue };
                // The remote device's endpoint info isn't known at the
                // socket layer on this medium; it arrives in the
                // CONNECTION_REQUEST frame the PCP handler reads next.
                on_incoming(IncomingConnection {
                    remote_endpoint_info: empty_endpoint_info(),
                    socket: Box::new(LoopbackSocket(stream)),
                });
            }
        });

        Ok(Box::new(AdvertisingGuard {
            service_id: service_id.to_string(),
            medium_id: self.id,
            stopped,
            accept_addr: addr,
        }))
    }

    fn start_discovery(
        &self,
        service_id: &str,
        on_found: Box<dyn Fn(DiscoveredEndpoint) + Send + Sync>,
        on_lost: Box<dyn Fn(EndpointId) + Send + Sync>,
    ) -> Result<Box<dyn StopGuard>, MediumError> {
        let stopped = Arc::new(AtomicBool::new(false));
        let loop_stopped = Arc::clone(&stopped);
        let service_id = service_id.to_string();
        let self_id = self.id;

        std::thread::spawn(move || {
            let mut known: HashMap<EndpointId, SocketAddr> = HashMap::new();
            while !loop_stopped.load(Ordering::SeqCst) {
                let current: HashMap<EndpointId, Advertisement> = registry()
                    .lock()
                    .get(&service_id)
                    .cloned()
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|a| a.medium_id != self_id)
                    .map(|a| (a.endpoint_id, a))
                    .collect();

                for (id, ad) in &current {
                    if !known.contains_key(id) {
                        on_found(DiscoveredEndpoint {
                            endpoint_id: *id,
                            descriptor: EndpointDescriptor { medium: MediumKind::WifiLan, opaque: encode_addr(ad.addr) },
                            endpoint_info: ad.endpoint_info.clone(),
                        });
                    }
                }
                for id in known.keys() {
                    if !current.contains_key(id) {
                        on_lost(*id);
                    }
                }
                known = current.into_iter().map(|(id, ad)| (id, ad.addr)).collect();

                std::thread::sleep(DISCOVERY_POLL_INTERVAL);
            }
        });

        Ok(Box::new(DiscoveryGuard { stopped }))
    }

    fn connect_to(&self, descriptor: &EndpointDescriptor) -> Result<Box<dyn Socket>, MediumError> {
        let addr = decode_addr(&descriptor.opaque)?;
        let stream = TcpStream::connect(addr).map_err(MediumError::Io)?;
        Ok(Box::new(LoopbackSocket(stream)))
    }
}

fn empty_endpoint_info() -> EndpointInfo {
    EndpointInfo::new(Vec::new()).expect("empty bytes are always a valid endpoint info")
}

fn encode_addr(addr: SocketAddr) -> Vec<u8> {
    addr.port().to_be_bytes().to_vec()
}

fn decode_addr(bytes: &[u8]) -> Result<SocketAddr, MediumError> {
    if bytes.len() != 2 {
        return Err(MediumError::Io(io::Error::new(io::ErrorKind::InvalidData, "malformed loopback descriptor")));
    }
    let port = u16::from_be_bytes([bytes[0], bytes[1]]);
    Ok(SocketAddr::from(([127, 0, 0, 1], port)))
}
