//! Topology enforcement (§4.6): a single `Strategy::topology_rule()` table
//! consumed identically by the advertiser and discoverer path, rather than
//! duplicated per-strategy handlers — a simplification of the original's
//! `p2p_star_pcp_handler.cc` / `p2p_point_to_point_pcp_handler.cc` split,
//! which hand-rolls the same check once per strategy subclass.

use nearlink_core::Strategy;

/// Current connection counts for one local session, as seen by the PCP
/// handler before it allows a new outgoing/incoming connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionCounts {
    pub outgoing: usize,
    pub incoming: usize,
}

pub fn can_send_outgoing(strategy: Strategy, counts: ConnectionCounts) -> bool {
    strategy.topology_rule().can_send_outgoing(counts.outgoing, counts.incoming)
}

pub fn can_receive_incoming(strategy: Strategy, counts: ConnectionCounts) -> bool {
    strategy.topology_rule().can_receive_incoming(counts.outgoing, counts.incoming)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_advertiser_accepts_a_second_incoming_connection() {
        let counts = ConnectionCounts { outgoing: 0, incoming: 1 };
        assert!(can_receive_incoming(Strategy::P2pStar, counts));
    }

    #[test]
    fn star_discoverer_cannot_open_a_second_outgoing_connection() {
        let counts = ConnectionCounts { outgoing: 1, incoming: 0 };
        assert!(!can_send_outgoing(Strategy::P2pStar, counts));
    }

    #[test]
    fn point_to_point_rejects_any_second_connection_either_direction() {
        let after_one_outgoing = ConnectionCounts { outgoing: 1, incoming: 0 };
        assert!(!can_send_outgoing(Strategy::P2pPointToPoint, after_one_outgoing));
        assert!(!can_receive_incoming(Strategy::P2pPointToPoint, after_one_outgoing));
    }

    #[test]
    fn cluster_always_allows_more_connections() {
        let counts = ConnectionCounts { outgoing: 50, incoming: 50 };
        assert!(can_send_outgoing(Strategy::P2pCluster, counts));
        assert!(can_receive_incoming(Strategy::P2pCluster, counts));
    }
}

#[cfg(test)]
mod proptests {
    use super::{can_receive_incoming, can_send_outgoing, ConnectionCounts};
    use nearlink_core::Strategy as TopologyStrategy;
    use proptest::prelude::*;

    #[derive(Debug, Clone, Copy)]
    enum Transition {
        Outgoing,
        Incoming,
    }

    fn arb_strategy() -> impl Strategy<Value = TopologyStrategy> {
        prop_oneof![
            Just(TopologyStrategy::P2pCluster),
            Just(TopologyStrategy::P2pStar),
            Just(TopologyStrategy::P2pPointToPoint),
        ]
    }

    fn arb_transition() -> impl Strategy<Value = Transition> {
        prop_oneof![Just(Transition::Outgoing), Just(Transition::Incoming)]
    }

    proptest! {
        /// §8: "For all strategies S, the topology rules in §4.6 hold after
        /// every state transition." Replays an arbitrary sequence of
        /// connection attempts against one `Strategy` and checks the
        /// invariants for point-to-point (at most one connection total) and
        /// star (advertiser unbounded incoming, discoverer at most one
        /// outgoing) never get violated by a transition the rule table
        /// itself allowed.
        #[test]
        fn topology_invariants_hold_after_every_transition(
            strategy in arb_strategy(),
            transitions in proptest::collection::vec(arb_transition(), 0..64),
        ) {
            let mut counts = ConnectionCounts::default();
            for t in transitions {
                match t {
                    Transition::Outgoing => {
                        if can_send_outgoing(strategy, counts) {
                            counts.outgoing += 1;
                        }
                    }
                    Transition::Incoming => {
                        if can_receive_incoming(strategy, counts) {
                            counts.incoming += 1;
                        }
                    }
                }

                match strategy {
                    TopologyStrategy::P2pPointToPoint => {
                        prop_assert!(counts.outgoing + counts.incoming <= 1);
                    }
                    TopologyStrategy::P2pStar => {
                        prop_assert!(counts.outgoing <= 1);
                        prop_assert!(counts.outgoing == 0 || counts.incoming == 0);
                    }
                    TopologyStrategy::P2pCluster => {
                        // unbounded; no additional invariant beyond the
                        // rule table always admitting the transition.
                    }
                }
            }
        }
    }
}
