//! N-of-M routing registration

use alloy_primitives::Address;
use keynet_primitives::{KeyHash, NodeId, majority_threshold};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use crate::{RoutingData, RoutingError, ValidatorView, key_address};

/// Votes and committed data for one key hash
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRegistration {
    /// Data from the latest counted vote
    pub candidate: Option<RoutingData>,
    /// Frozen once set
    pub committed: Option<RoutingData>,
    /// Counted votes; never decreases
    pub vote_count: usize,
    /// Each voter's submission
    pub voted_by: BTreeMap<NodeId, RoutingData>,
    /// Threshold computed at the latest vote
    pub threshold: usize,
}

impl RoutingRegistration {
    /// Check if the data is committed
    pub const fn is_committed(&self) -> bool {
        self.committed.is_some()
    }
}

/// Result of a routing vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Vote counted, threshold not reached
    Recorded {
        /// Counted votes
        votes: usize,
        /// Votes needed
        threshold: usize,
    },
    /// Identical resubmission; nothing counted
    AlreadyVoted,
    /// This vote committed the data
    Committed,
    /// Data was committed before this vote
    AlreadyCommitted,
}

/// Routing registrations keyed by key hash
#[derive(Debug, Clone, Default)]
pub struct RoutingConsensus {
    registrations: HashMap<KeyHash, RoutingRegistration>,
    commit_order: Vec<KeyHash>,
    addresses: HashMap<Address, KeyHash>,
}

impl RoutingConsensus {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Vote for the routing data of `key_hash`.
    ///
    /// The threshold is a simple majority of the active validator count read from
    /// `validators` on this call.
    pub fn vote_for_routing_data(
        &mut self,
        caller: NodeId,
        key_hash: KeyHash,
        data: RoutingData,
        validators: &impl ValidatorView,
    ) -> Result<VoteOutcome, RoutingError> {
        if !validators.is_active_validator(&caller) {
            return Err(RoutingError::Unauthorized(caller));
        }
        if self.is_routed(&key_hash) {
            return Ok(VoteOutcome::AlreadyCommitted);
        }
        data.validate(&key_hash)?;

        let threshold = majority_threshold(validators.active_validator_count());
        let registration = self.registrations.entry(key_hash).or_default();

        let counted = match registration.voted_by.get(&caller) {
            Some(previous) if *previous == data => false,
            Some(_) => {
                warn!(
                    target: "keynet::routing",
                    voter = %caller,
                    %key_hash,
                    "Conflicting routing vote rejected"
                );
                return Err(RoutingError::DuplicateVote { voter: caller, key_hash });
            }
            None => true,
        };
        if counted {
            registration.candidate = Some(data.clone());
            registration.voted_by.insert(caller, data);
            registration.vote_count += 1;
        }
        registration.threshold = threshold;

        let votes = registration.vote_count;
        if votes < threshold {
            debug!(
                target: "keynet::routing",
                voter = %caller,
                %key_hash,
                votes,
                threshold,
                "Routing vote recorded"
            );
            return Ok(if counted {
                VoteOutcome::Recorded { votes, threshold }
            } else {
                VoteOutcome::AlreadyVoted
            });
        }

        let Some(data) = registration.candidate.clone() else {
            return Ok(VoteOutcome::AlreadyVoted);
        };
        registration.committed = Some(data.clone());

        self.commit_order.push(key_hash);
        let address = key_address(&data.pubkey);
        if let Some(address) = address {
            self.addresses.insert(address, key_hash);
        }

        info!(
            target: "keynet::routing",
            %key_hash,
            key_type = data.key_type,
            votes,
            threshold,
            address = ?address,
            "Routing data committed"
        );
        Ok(VoteOutcome::Committed)
    }

    /// Committed routing data of a key
    pub fn get_routing_data(&self, key_hash: &KeyHash) -> Option<&RoutingData> {
        self.registrations.get(key_hash).and_then(|r| r.committed.as_ref())
    }

    /// Check if a key's routing data is committed
    pub fn is_routed(&self, key_hash: &KeyHash) -> bool {
        self.get_routing_data(key_hash).is_some()
    }

    /// Full registration of a key, if anyone voted on it
    pub fn registration(&self, key_hash: &KeyHash) -> Option<&RoutingRegistration> {
        self.registrations.get(key_hash)
    }

    /// Counted votes for a key
    pub fn vote_count(&self, key_hash: &KeyHash) -> usize {
        self.registrations.get(key_hash).map_or(0, |r| r.vote_count)
    }

    /// Address derived from a routed key's public key
    pub fn key_address(&self, key_hash: &KeyHash) -> Option<Address> {
        self.get_routing_data(key_hash).and_then(|data| key_address(&data.pubkey))
    }

    /// Routed key whose public key derives `address`
    pub fn key_hash_for_address(&self, address: &Address) -> Option<KeyHash> {
        self.addresses.get(address).copied()
    }

    /// Routed keys of a type, in commit order
    pub fn routed_keys(&self, key_type: u8) -> impl Iterator<Item = KeyHash> + '_ {
        self.commit_order.iter().copied().filter(move |key_hash| {
            self.get_routing_data(key_hash).is_some_and(|data| data.key_type == key_type)
        })
    }

    /// Number of routed keys
    pub fn routed_count(&self) -> usize {
        self.commit_order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, hex};
    use assert_matches::assert_matches;
    use keynet_staking::{CommsKeys, InMemoryToken, NodeEndpoint, Staking, StakingParams};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    const CONTRACT: Address = Address::repeat_byte(0xcc);

    /// Fixed set of active nodes
    struct Nodes(BTreeSet<NodeId>);

    impl Nodes {
        fn first(count: u8) -> Self {
            Self((1..=count).map(Address::repeat_byte).collect())
        }
    }

    impl ValidatorView for Nodes {
        fn is_active_validator(&self, node: &NodeId) -> bool {
            self.0.contains(node)
        }

        fn active_validator_count(&self) -> usize {
            self.0.len()
        }
    }

    fn node(i: u8) -> NodeId {
        Address::repeat_byte(i)
    }

    fn data(seed: u8, key_type: u8) -> RoutingData {
        let mut pubkey = vec![0x02; 33];
        pubkey[32] = seed;
        RoutingData::new(pubkey, CONTRACT, key_type)
    }

    #[test]
    fn test_majority_of_ten_commits_on_sixth_vote() {
        let nodes = Nodes::first(10);
        let mut routing = RoutingConsensus::new();
        let data = data(1, 2);
        let key_hash = data.key_hash();

        for i in 1..=5 {
            let outcome =
                routing.vote_for_routing_data(node(i), key_hash, data.clone(), &nodes).unwrap();
            assert_eq!(outcome, VoteOutcome::Recorded { votes: i as usize, threshold: 6 });
        }
        assert!(!routing.is_routed(&key_hash));
        assert_eq!(routing.get_routing_data(&key_hash), None);

        let outcome =
            routing.vote_for_routing_data(node(6), key_hash, data.clone(), &nodes).unwrap();
        assert_eq!(outcome, VoteOutcome::Committed);
        assert!(routing.is_routed(&key_hash));
        assert_eq!(routing.get_routing_data(&key_hash), Some(&data));
    }

    #[test]
    fn test_committed_data_is_frozen() {
        let nodes = Nodes::first(1);
        let mut routing = RoutingConsensus::new();
        let first = data(1, 2);
        let key_hash = first.key_hash();
        routing.vote_for_routing_data(node(1), key_hash, first.clone(), &nodes).unwrap();

        let mut other = first.clone();
        other.staking_contract = Address::repeat_byte(0xdd);
        let outcome = routing.vote_for_routing_data(node(1), key_hash, other, &nodes).unwrap();
        assert_eq!(outcome, VoteOutcome::AlreadyCommitted);
        assert_eq!(routing.get_routing_data(&key_hash), Some(&first));
        assert_eq!(routing.vote_count(&key_hash), 1);
    }

    #[test]
    fn test_identical_resubmission_not_double_counted() {
        let nodes = Nodes::first(10);
        let mut routing = RoutingConsensus::new();
        let data = data(1, 2);
        let key_hash = data.key_hash();

        routing.vote_for_routing_data(node(1), key_hash, data.clone(), &nodes).unwrap();
        let outcome = routing.vote_for_routing_data(node(1), key_hash, data, &nodes).unwrap();
        assert_eq!(outcome, VoteOutcome::AlreadyVoted);
        assert_eq!(routing.vote_count(&key_hash), 1);
    }

    #[test]
    fn test_conflicting_resubmission_rejected() {
        let nodes = Nodes::first(10);
        let mut routing = RoutingConsensus::new();
        let first = data(1, 2);
        let key_hash = first.key_hash();
        routing.vote_for_routing_data(node(1), key_hash, first.clone(), &nodes).unwrap();

        let mut other = first;
        other.key_type = 3;
        assert_matches!(
            routing.vote_for_routing_data(node(1), key_hash, other, &nodes),
            Err(RoutingError::DuplicateVote { .. })
        );
        assert_eq!(routing.vote_count(&key_hash), 1);
    }

    #[test]
    fn test_non_validator_rejected() {
        let nodes = Nodes::first(3);
        let mut routing = RoutingConsensus::new();
        let data = data(1, 2);
        let key_hash = data.key_hash();

        assert_matches!(
            routing.vote_for_routing_data(node(9), key_hash, data, &nodes),
            Err(RoutingError::Unauthorized(_))
        );
        assert!(routing.registration(&key_hash).is_none());
    }

    #[test]
    fn test_mismatched_key_hash_rejected() {
        let nodes = Nodes::first(3);
        let mut routing = RoutingConsensus::new();
        assert_matches!(
            routing.vote_for_routing_data(node(1), KeyHash::ZERO, data(1, 2), &nodes),
            Err(RoutingError::KeyHashMismatch { .. })
        );
    }

    #[test]
    fn test_threshold_follows_live_validator_count() {
        let mut routing = RoutingConsensus::new();
        let data = data(1, 2);
        let key_hash = data.key_hash();

        let ten = Nodes::first(10);
        for i in 1..=3 {
            routing.vote_for_routing_data(node(i), key_hash, data.clone(), &ten).unwrap();
        }

        // set shrank to four: threshold 3 is already met by the next vote
        let four = Nodes::first(4);
        let outcome = routing.vote_for_routing_data(node(4), key_hash, data, &four).unwrap();
        assert_eq!(outcome, VoteOutcome::Committed);
        assert_eq!(routing.registration(&key_hash).unwrap().threshold, 3);
    }

    #[test]
    fn test_last_counted_candidate_is_committed() {
        let nodes = Nodes::first(3);
        let mut routing = RoutingConsensus::new();
        let first = data(1, 2);
        let key_hash = first.key_hash();
        let mut second = first.clone();
        second.staking_contract = Address::repeat_byte(0xdd);

        routing.vote_for_routing_data(node(1), key_hash, first, &nodes).unwrap();
        routing.vote_for_routing_data(node(2), key_hash, second.clone(), &nodes).unwrap();
        assert_eq!(routing.get_routing_data(&key_hash), Some(&second));
    }

    #[test]
    fn test_key_address_index() {
        let nodes = Nodes::first(1);
        let mut routing = RoutingConsensus::new();
        let pubkey = hex!("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798");
        let data = RoutingData::new(pubkey.to_vec(), CONTRACT, 2);
        let key_hash = data.key_hash();

        routing.vote_for_routing_data(node(1), key_hash, data, &nodes).unwrap();

        let address = routing.key_address(&key_hash).unwrap();
        assert_eq!(address, Address::from(hex!("7e5f4552091a69125d5dfcb7b8c2659029395bdf")));
        assert_eq!(routing.key_hash_for_address(&address), Some(key_hash));
    }

    #[test]
    fn test_routed_keys_in_commit_order() {
        let nodes = Nodes::first(1);
        let mut routing = RoutingConsensus::new();
        let keys: Vec<_> = [(3, 2), (1, 1), (2, 2)].map(|(seed, ty)| data(seed, ty)).to_vec();
        for data in &keys {
            routing.vote_for_routing_data(node(1), data.key_hash(), data.clone(), &nodes).unwrap();
        }

        let routed: Vec<_> = routing.routed_keys(2).collect();
        assert_eq!(routed, vec![keys[0].key_hash(), keys[2].key_hash()]);
        assert_eq!(routing.routed_count(), 3);
    }

    #[test]
    fn test_staking_as_validator_view() {
        let mut staking = Staking::new(StakingParams::default(), InMemoryToken::default(), 0);
        for i in 1..=3u8 {
            let staker = Address::with_last_byte(i);
            staking.token_mut().mint(staker, U256::from(100u64));
            staking
                .stake_and_join(
                    staker,
                    U256::from(100u64),
                    node(i),
                    NodeEndpoint::new(0x7f00_0001, 7000),
                    CommsKeys::default(),
                )
                .unwrap();
        }
        for member in staking.lock_validators_for_next_epoch().unwrap() {
            let node = staking.validator(&member).unwrap().node;
            staking.signal_ready_for_next_epoch(node, 1).unwrap();
        }
        staking.advance_epoch(1).unwrap();

        let mut routing = RoutingConsensus::new();
        let data = data(1, 2);
        let key_hash = data.key_hash();
        routing.vote_for_routing_data(node(1), key_hash, data.clone(), &staking).unwrap();
        assert_eq!(
            routing.vote_for_routing_data(node(2), key_hash, data, &staking).unwrap(),
            VoteOutcome::Committed
        );
    }

    proptest! {
        #[test]
        fn prop_votes_monotonic_and_commit_frozen(
            votes in prop::collection::vec((1u8..=10, 0u8..3), 1..40),
        ) {
            let nodes = Nodes::first(10);
            let mut routing = RoutingConsensus::new();
            let key_hash = data(7, 2).key_hash();
            let mut count = 0;
            let mut committed: Option<RoutingData> = None;

            for (voter, choice) in votes {
                let mut candidate = data(7, 2);
                candidate.staking_contract = Address::repeat_byte(choice);
                let _ = routing.vote_for_routing_data(node(voter), key_hash, candidate, &nodes);

                let now = routing.vote_count(&key_hash);
                prop_assert!(now >= count);
                count = now;

                let data = routing.get_routing_data(&key_hash).cloned();
                if committed.is_some() {
                    prop_assert_eq!(&data, &committed);
                }
                committed = data;
            }
            prop_assert!(count <= 10);
        }
    }
}
