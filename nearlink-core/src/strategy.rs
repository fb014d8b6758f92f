//! Topology strategy (§3 "Strategy") and the topology rule table (§4.6).

/// Topology choice, immutable once advertising/discovery starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// M:N — any endpoint may hold any number of connections.
    P2pCluster,
    /// 1:N — the advertiser may hold N connections, the discoverer at most 1.
    P2pStar,
    /// 1:1 — at most one connection total, in either role.
    P2pPointToPoint,
}

/// Whether a new outgoing/incoming connection is allowed given the current
/// connection counts, per the §4.6 table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopologyRule {
    pub max_outgoing: Option<usize>,
    pub max_incoming: Option<usize>,
}

impl Strategy {
    pub fn topology_rule(self) -> TopologyRule {
        match self {
            Strategy::P2pPointToPoint => TopologyRule {
                max_outgoing: Some(1),
                max_incoming: Some(1),
            },
            Strategy::P2pStar => TopologyRule {
                max_outgoing: Some(1),
                max_incoming: None,
            },
            Strategy::P2pCluster => TopologyRule {
                max_outgoing: None,
                max_incoming: None,
            },
        }
    }
}

impl TopologyRule {
    /// §4.6: can this role open one more outgoing connection, given the
    /// endpoint has `outgoing` existing outgoing and `incoming` existing
    /// incoming connections. POINT_TO_POINT and STAR both forbid any
    /// existing connection (in either direction) before an outgoing one.
    pub fn can_send_outgoing(&self, outgoing: usize, incoming: usize) -> bool {
        match self.max_outgoing {
            None => true,
            Some(max) => outgoing < max && incoming == 0,
        }
    }

    /// §4.6: can this role accept one more incoming connection.
    /// STAR allows incoming regardless of other incoming connections, but
    /// still forbids accepting while an outgoing connection is active.
    pub fn can_receive_incoming(&self, outgoing: usize, incoming: usize) -> bool {
        match self.max_incoming {
            None => outgoing == 0 || self.max_outgoing.is_none(),
            Some(max) => incoming < max && outgoing == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_to_point_forbids_any_existing_connection() {
        let rule = Strategy::P2pPointToPoint.topology_rule();
        assert!(rule.can_send_outgoing(0, 0));
        assert!(!rule.can_send_outgoing(1, 0));
        assert!(!rule.can_send_outgoing(0, 1));
        assert!(rule.can_receive_incoming(0, 0));
        assert!(!rule.can_receive_incoming(1, 0));
        assert!(!rule.can_receive_incoming(0, 1));
    }

    #[test]
    fn star_advertiser_can_hold_n_incoming() {
        let rule = Strategy::P2pStar.topology_rule();
        assert!(rule.can_receive_incoming(0, 0));
        assert!(rule.can_receive_incoming(0, 5));
        assert!(!rule.can_receive_incoming(1, 0));
    }

    #[test]
    fn star_discoverer_limited_to_one_outgoing() {
        let rule = Strategy::P2pStar.topology_rule();
        assert!(rule.can_send_outgoing(0, 0));
        assert!(!rule.can_send_outgoing(1, 0));
        assert!(!rule.can_send_outgoing(0, 1));
    }

    #[test]
    fn cluster_is_unbounded() {
        let rule = Strategy::P2pCluster.topology_rule();
        assert!(rule.can_send_outgoing(1000, 1000));
        assert!(rule.can_receive_incoming(1000, 1000));
    }
}
