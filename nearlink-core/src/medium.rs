//! Transport mediums (§3 "Medium") and their capabilities/priority order.

/// A physical wireless transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Medium {
    Bluetooth,
    Ble,
    WifiLan,
    WifiHotspot,
    WifiDirect,
    WebRtc,
}

/// Declares what a medium driver supports. Populated by the pluggable
/// driver, not computed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediumCapability {
    pub available: bool,
    pub supports_discovery: bool,
    pub supports_advertising: bool,
}

/// Default priority order for an *initial* connection attempt (§3):
/// `wifi_lan > web_rtc > bluetooth > ble`. Mediums not in this slice
/// (currently none) sort last.
pub const INITIAL_CONNECTION_PRIORITY: &[Medium] = &[
    Medium::WifiLan,
    Medium::WebRtc,
    Medium::Bluetooth,
    Medium::Ble,
];

/// Default bandwidth-upgrade target medium per strategy (§4.7). `None`
/// means "no default upgrade target for this strategy; caller must pick
/// one explicitly".
pub fn default_upgrade_medium(strategy: crate::strategy::Strategy) -> Option<Medium> {
    use crate::strategy::Strategy::*;
    match strategy {
        P2pStar => Some(Medium::WifiHotspot),
        P2pCluster | P2pPointToPoint => Some(Medium::WifiLan),
    }
}

/// All six mediums, in the canonical enumeration order used by the §6
/// `allowed_mediums` boolean set and the BLE advertisement's medium list.
pub const ALL: [Medium; 6] = [
    Medium::Bluetooth,
    Medium::Ble,
    Medium::WifiLan,
    Medium::WifiHotspot,
    Medium::WifiDirect,
    Medium::WebRtc,
];

impl Medium {
    /// Orders `candidates` by [`INITIAL_CONNECTION_PRIORITY`], dropping any
    /// medium not present in that list's relative order preservation isn't
    /// needed since the list is exhaustive over mediums usable for an
    /// initial connection (WIFI_HOTSPOT/WIFI_DIRECT are upgrade-only).
    pub fn sort_by_initial_priority(candidates: &mut Vec<Medium>) {
        candidates.sort_by_key(|m| {
            INITIAL_CONNECTION_PRIORITY
                .iter()
                .position(|p| p == m)
                .unwrap_or(usize::MAX)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_orders_wifi_lan_first() {
        let mut candidates = vec![Medium::Ble, Medium::Bluetooth, Medium::WifiLan, Medium::WebRtc];
        Medium::sort_by_initial_priority(&mut candidates);
        assert_eq!(
            candidates,
            vec![Medium::WifiLan, Medium::WebRtc, Medium::Bluetooth, Medium::Ble]
        );
    }

    #[test]
    fn star_upgrades_to_hotspot_by_default() {
        assert_eq!(
            default_upgrade_medium(crate::strategy::Strategy::P2pStar),
            Some(Medium::WifiHotspot)
        );
    }
}
