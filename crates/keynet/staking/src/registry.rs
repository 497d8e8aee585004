//! Staker to node registry
//!
//! Maps a staking identity to the node identity it votes with, the node's network
//! endpoint and its communication keys, and keeps the reverse node lookup.

use alloy_primitives::U256;
use keynet_primitives::{Ipv4Int, NodeId, StakerId, ipv4_from_int};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::Ipv4Addr};
use tracing::debug;

use crate::StakingError;

/// Network endpoint advertised by a validator node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeEndpoint {
    /// Packed IPv4 address
    pub ip: Ipv4Int,
    /// IPv6 address, zero when unset
    pub ipv6: u128,
    /// Listening port
    pub port: u16,
}

impl NodeEndpoint {
    /// Create an IPv4-only endpoint
    pub const fn new(ip: Ipv4Int, port: u16) -> Self {
        Self { ip, ipv6: 0, port }
    }

    /// Attach an IPv6 address
    pub const fn with_ipv6(mut self, ipv6: u128) -> Self {
        self.ipv6 = ipv6;
        self
    }

    /// IPv4 address
    pub fn ipv4(&self) -> Ipv4Addr {
        ipv4_from_int(self.ip)
    }
}

/// Public keys used for node-to-node communication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommsKeys {
    /// Key used when sending
    pub sender: U256,
    /// Key used when receiving
    pub receiver: U256,
}

/// Registry entry for one staker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorRecord {
    /// Staking identity
    pub staker: StakerId,
    /// Node identity
    pub node: NodeId,
    /// Network endpoint
    pub endpoint: NodeEndpoint,
    /// Communication keys
    pub comms_keys: CommsKeys,
    /// Reward accrued and not yet claimed
    pub reward: U256,
}

/// Full validator view: registry record plus staked balance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    /// Staking identity
    pub staker: StakerId,
    /// Node identity
    pub node: NodeId,
    /// Staked balance
    pub balance: U256,
    /// Reward accrued and not yet claimed
    pub reward: U256,
    /// Network endpoint
    pub endpoint: NodeEndpoint,
    /// Communication keys
    pub comms_keys: CommsKeys,
}

impl Validator {
    /// Combine a registry record with a balance
    pub fn from_record(record: &ValidatorRecord, balance: U256) -> Self {
        Self {
            staker: record.staker,
            node: record.node,
            balance,
            reward: record.reward,
            endpoint: record.endpoint,
            comms_keys: record.comms_keys,
        }
    }
}

/// Staker/node registry
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    records: HashMap<StakerId, ValidatorRecord>,
    node_to_staker: HashMap<NodeId, StakerId>,
}

impl ValidatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail if `node` is claimed by a staker other than `staker`
    pub fn ensure_node_available(
        &self,
        staker: &StakerId,
        node: &NodeId,
    ) -> Result<(), StakingError> {
        match self.node_to_staker.get(node) {
            Some(owner) if owner != staker => {
                Err(StakingError::DuplicateNodeIdentity { node: *node, staker: *owner })
            }
            _ => Ok(()),
        }
    }

    /// Register or overwrite a staker's node metadata
    pub fn register(
        &mut self,
        staker: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), StakingError> {
        self.ensure_node_available(&staker, &node)?;

        let reward = match self.records.get(&staker) {
            Some(previous) => {
                if previous.node != node {
                    self.node_to_staker.remove(&previous.node);
                }
                previous.reward
            }
            None => U256::ZERO,
        };

        self.node_to_staker.insert(node, staker);
        self.records.insert(staker, ValidatorRecord { staker, node, endpoint, comms_keys, reward });

        debug!(
            target: "keynet::registry",
            %staker,
            %node,
            ip = %endpoint.ipv4(),
            port = endpoint.port,
            "Validator registered"
        );
        Ok(())
    }

    /// Remove a staker and its node mapping
    pub fn remove(&mut self, staker: &StakerId) -> Option<ValidatorRecord> {
        let record = self.records.remove(staker)?;
        self.node_to_staker.remove(&record.node);
        Some(record)
    }

    /// Restore a previously removed record
    pub fn restore(&mut self, record: ValidatorRecord) {
        self.node_to_staker.insert(record.node, record.staker);
        self.records.insert(record.staker, record);
    }

    /// Staker a node identity belongs to
    pub fn lookup_by_node(&self, node: &NodeId) -> Option<StakerId> {
        self.node_to_staker.get(node).copied()
    }

    /// Registry record of a staker
    pub fn get(&self, staker: &StakerId) -> Option<&ValidatorRecord> {
        self.records.get(staker)
    }

    /// Check if a staker has registered node metadata
    pub fn contains(&self, staker: &StakerId) -> bool {
        self.records.contains_key(staker)
    }

    /// Credit reward to a registered staker
    pub fn credit_reward(&mut self, staker: &StakerId, amount: U256) {
        if let Some(record) = self.records.get_mut(staker) {
            record.reward = record.reward.saturating_add(amount);
        }
    }

    /// Take a staker's accrued reward, leaving zero
    pub fn take_reward(&mut self, staker: &StakerId) -> U256 {
        self.records.get_mut(staker).map(|r| std::mem::take(&mut r.reward)).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use assert_matches::assert_matches;
    use keynet_primitives::ipv4_to_int;

    fn endpoint(port: u16) -> NodeEndpoint {
        NodeEndpoint::new(ipv4_to_int(Ipv4Addr::new(192, 168, 1, 1)), port)
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ValidatorRegistry::new();
        let staker = Address::repeat_byte(1);
        let node = Address::repeat_byte(0xa1);

        registry.register(staker, node, endpoint(7777), CommsKeys::default()).unwrap();

        assert_eq!(registry.lookup_by_node(&node), Some(staker));
        let record = registry.get(&staker).unwrap();
        assert_eq!(record.endpoint.port, 7777);
        assert_eq!(record.endpoint.ipv4(), Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut registry = ValidatorRegistry::new();
        let node = Address::repeat_byte(0xa1);

        registry
            .register(Address::repeat_byte(1), node, endpoint(1), CommsKeys::default())
            .unwrap();
        let result =
            registry.register(Address::repeat_byte(2), node, endpoint(2), CommsKeys::default());

        assert_matches!(result, Err(StakingError::DuplicateNodeIdentity { .. }));
        assert!(!registry.contains(&Address::repeat_byte(2)));
    }

    #[test]
    fn test_reregister_overwrites() {
        let mut registry = ValidatorRegistry::new();
        let staker = Address::repeat_byte(1);
        let old_node = Address::repeat_byte(0xa1);
        let new_node = Address::repeat_byte(0xa2);

        registry.register(staker, old_node, endpoint(1), CommsKeys::default()).unwrap();
        registry.credit_reward(&staker, U256::from(5u64));
        registry.register(staker, old_node, endpoint(2), CommsKeys::default()).unwrap();
        assert_eq!(registry.get(&staker).unwrap().endpoint.port, 2);

        registry.register(staker, new_node, endpoint(3), CommsKeys::default()).unwrap();
        assert_eq!(registry.lookup_by_node(&old_node), None);
        assert_eq!(registry.lookup_by_node(&new_node), Some(staker));
        assert_eq!(registry.get(&staker).unwrap().reward, U256::from(5u64));
    }

    #[test]
    fn test_remove_and_restore() {
        let mut registry = ValidatorRegistry::new();
        let staker = Address::repeat_byte(1);
        let node = Address::repeat_byte(0xa1);
        registry.register(staker, node, endpoint(1), CommsKeys::default()).unwrap();

        let record = registry.remove(&staker).unwrap();
        assert_eq!(registry.lookup_by_node(&node), None);

        registry.restore(record);
        assert_eq!(registry.lookup_by_node(&node), Some(staker));
    }
}
