//! Advertising/discovery configuration records (§6, §9).

use crate::medium::Medium;
use crate::strategy::Strategy;
use std::collections::HashSet;

/// Per-medium allow-list. An empty set means "unspecified"; see
/// [`MediumSet::normalized`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediumSet(HashSet<Medium>);

impl MediumSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, medium: Medium) -> Self {
        self.0.insert(medium);
        self
    }

    pub fn contains(&self, medium: Medium) -> bool {
        self.0.contains(&medium)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Medium> + '_ {
        self.0.iter().copied()
    }

    /// §9 `compatible_options()`: an unspecified (empty) medium set means
    /// "all mediums allowed"; an out-of-band request (one with
    /// `remote_bluetooth_mac_address` set) collapses to exactly one medium,
    /// defaulting to Bluetooth Classic.
    pub fn normalized(&self, out_of_band: bool) -> MediumSet {
        if out_of_band {
            return MediumSet::new().with(Medium::Bluetooth);
        }
        if self.0.is_empty() {
            let mut all = HashSet::new();
            all.extend(crate::medium::ALL);
            return MediumSet(all);
        }
        self.clone()
    }
}

/// Default keep-alive interval (§4.5, §6): 5 seconds.
pub const DEFAULT_KEEP_ALIVE_INTERVAL_MS: u64 = 5_000;
/// Default keep-alive timeout (§4.5, §5, §6): 30 seconds.
pub const DEFAULT_KEEP_ALIVE_TIMEOUT_MS: u64 = 30_000;
/// Default connection request timeout (§5): 30 seconds.
pub const DEFAULT_CONNECTION_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// A 6-byte Bluetooth Classic MAC address, for out-of-band connections.
pub type BluetoothMacAddress = [u8; 6];

#[derive(Debug, Clone, PartialEq, Eq)]
struct CommonOptions {
    strategy: Strategy,
    allowed_mediums: MediumSet,
    auto_upgrade_bandwidth: bool,
    enforce_topology_constraints: bool,
    low_power: bool,
    keep_alive_interval_ms: u64,
    keep_alive_timeout_ms: u64,
    remote_bluetooth_mac_address: Option<BluetoothMacAddress>,
    fast_advertisement_service_uuid: Option<String>,
}

impl Default for CommonOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::P2pCluster,
            allowed_mediums: MediumSet::default(),
            auto_upgrade_bandwidth: true,
            enforce_topology_constraints: true,
            low_power: false,
            keep_alive_interval_ms: DEFAULT_KEEP_ALIVE_INTERVAL_MS,
            keep_alive_timeout_ms: DEFAULT_KEEP_ALIVE_TIMEOUT_MS,
            remote_bluetooth_mac_address: None,
            fast_advertisement_service_uuid: None,
        }
    }
}

macro_rules! common_accessors {
    () => {
        pub fn strategy(&self) -> Strategy {
            self.common.strategy
        }

        pub fn with_strategy(mut self, strategy: Strategy) -> Self {
            self.common.strategy = strategy;
            self
        }

        pub fn allowed_mediums(&self) -> &MediumSet {
            &self.common.allowed_mediums
        }

        pub fn with_allowed_mediums(mut self, mediums: MediumSet) -> Self {
            self.common.allowed_mediums = mediums;
            self
        }

        pub fn auto_upgrade_bandwidth(&self) -> bool {
            self.common.auto_upgrade_bandwidth
        }

        pub fn with_auto_upgrade_bandwidth(mut self, enabled: bool) -> Self {
            self.common.auto_upgrade_bandwidth = enabled;
            self
        }

        pub fn enforce_topology_constraints(&self) -> bool {
            self.common.enforce_topology_constraints
        }

        pub fn with_enforce_topology_constraints(mut self, enabled: bool) -> Self {
            self.common.enforce_topology_constraints = enabled;
            self
        }

        pub fn low_power(&self) -> bool {
            self.common.low_power
        }

        pub fn with_low_power(mut self, enabled: bool) -> Self {
            self.common.low_power = enabled;
            self
        }

        pub fn keep_alive_interval_ms(&self) -> u64 {
            self.common.keep_alive_interval_ms
        }

        pub fn keep_alive_timeout_ms(&self) -> u64 {
            self.common.keep_alive_timeout_ms
        }

        pub fn with_keep_alive(mut self, interval_ms: u64, timeout_ms: u64) -> Self {
            self.common.keep_alive_interval_ms = interval_ms;
            self.common.keep_alive_timeout_ms = timeout_ms;
            self
        }

        pub fn remote_bluetooth_mac_address(&self) -> Option<BluetoothMacAddress> {
            self.common.remote_bluetooth_mac_address
        }

        pub fn with_remote_bluetooth_mac_address(mut self, addr: BluetoothMacAddress) -> Self {
            self.common.remote_bluetooth_mac_address = Some(addr);
            self
        }

        pub fn fast_advertisement_service_uuid(&self) -> Option<&str> {
            self.common.fast_advertisement_service_uuid.as_deref()
        }

        pub fn with_fast_advertisement_service_uuid(mut self, uuid: impl Into<String>) -> Self {
            self.common.fast_advertisement_service_uuid = Some(uuid.into());
            self
        }

        /// §9 `compatible_options()`.
        pub fn normalized_mediums(&self) -> MediumSet {
            self.common
                .allowed_mediums
                .normalized(self.common.remote_bluetooth_mac_address.is_some())
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdvertisingOptions {
    common: CommonOptions,
}

impl AdvertisingOptions {
    common_accessors!();
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryOptions {
    common: CommonOptions,
}

impl DiscoveryOptions {
    common_accessors!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_medium_set_normalizes_to_all() {
        let opts = DiscoveryOptions::default();
        let normalized = opts.normalized_mediums();
        for m in crate::medium::ALL {
            assert!(normalized.contains(m));
        }
    }

    #[test]
    fn out_of_band_normalizes_to_bluetooth_only() {
        let opts = DiscoveryOptions::default().with_remote_bluetooth_mac_address([1; 6]);
        let normalized = opts.normalized_mediums();
        assert_eq!(normalized.iter().collect::<Vec<_>>(), vec![Medium::Bluetooth]);
    }

    #[test]
    fn explicit_mediums_pass_through() {
        let opts = DiscoveryOptions::default()
            .with_allowed_mediums(MediumSet::new().with(Medium::Ble));
        let normalized = opts.normalized_mediums();
        assert_eq!(normalized.iter().collect::<Vec<_>>(), vec![Medium::Ble]);
    }
}
