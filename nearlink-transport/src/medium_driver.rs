//! Driver-facing traits (§6, §9 "Dynamic dispatch over medium drivers"):
//! the core depends on these, platform radio implementations provide them.
//! No inheritance tree — composition plus the `Medium` enum tag from
//! `nearlink-core`.

use nearlink_core::endpoint::EndpointInfo;
use nearlink_core::{EndpointId, Medium as MediumKind};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediumError {
    #[error("medium is not available on this device")]
    Unavailable,
    #[error("i/o error on medium socket: {0}")]
    Io(#[from] io::Error),
}

/// An opaque handle identifying a discovered remote endpoint to the driver
/// that found it (radio address, mDNS record, etc). The core never
/// inspects the contents.
#[derive(Debug, Clone)]
pub struct EndpointDescriptor {
    pub medium: MediumKind,
    pub opaque: Vec<u8>,
}

/// A live duplex byte stream to a connected peer (§6 "Socket").
pub trait Socket: Read + Write + Send {
    /// The largest chunk body a frame on this socket can carry once framed
    /// and, if applicable, encrypted (§4.5 "chunk size ... fit within one
    /// frame post-encryption").
    fn max_transmission_unit(&self) -> usize;

    fn close(&mut self);

    /// A handle that severs this socket from another thread, independent of
    /// whatever lock the caller holds on `self` (§4.2 "close ... releases
    /// transport socket"). Obtained once, before the socket is handed to
    /// `EndpointChannel`, so it can unblock a reader already parked inside
    /// a blocking call on this socket without needing `&mut self` back.
    fn shutdown_handle(&self) -> Box<dyn Fn() + Send + Sync>;
}

impl Read for Box<dyn Socket> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
}

impl Write for Box<dyn Socket> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// A discovered peer surfaced by `start_discovery`'s `on_found` callback.
/// `endpoint_id` is whatever the driver decoded from the radio-specific
/// advertisement (§6 BLE/Bluetooth-name packing); the core never derives it
/// itself.
#[derive(Debug, Clone)]
pub struct DiscoveredEndpoint {
    pub endpoint_id: EndpointId,
    pub descriptor: EndpointDescriptor,
    pub endpoint_info: EndpointInfo,
}

/// A peer that dialed in while advertising, surfaced by `start_advertising`'s
/// `on_incoming` callback.
pub struct IncomingConnection {
    pub remote_endpoint_info: EndpointInfo,
    pub socket: Box<dyn Socket>,
}

/// Dropping a guard stops the corresponding advertising/discovery session
/// (§9 "scoped acquisition": starts are paired with stops via a guard).
pub trait StopGuard: Send {
    fn stop(&mut self);
}

/// One physical wireless transport (§6 "Medium"). A platform implementation
/// supplies one instance per supported radio; `nearlink-transport` never
/// constructs these itself.
pub trait Medium: Send + Sync {
    fn kind(&self) -> MediumKind;

    fn is_available(&self) -> bool;

    fn start_advertising(
        &self,
        service_id: &str,
        endpoint_info: &EndpointInfo,
        on_incoming: Box<dyn Fn(IncomingConnection) + Send + Sync>,
    ) -> Result<Box<dyn StopGuard>, MediumError>;

    fn start_discovery(
        &self,
        service_id: &str,
        on_found: Box<dyn Fn(DiscoveredEndpoint) + Send + Sync>,
        on_lost: Box<dyn Fn(EndpointId) + Send + Sync>,
    ) -> Result<Box<dyn StopGuard>, MediumError>;

    fn connect_to(&self, descriptor: &EndpointDescriptor) -> Result<Box<dyn Socket>, MediumError>;
}
