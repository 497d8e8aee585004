//! Validator set for one epoch
//!
//! Two sets exist at once: the current set and the next set staged at lock time.

use keynet_primitives::{BlockNumber, StakerId, majority_threshold};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A frozen set of staking identities for one epoch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    /// Members ordered by identity
    members: BTreeSet<StakerId>,
    /// Epoch this set is (or will be) active in
    pub epoch: u64,
    /// Block number when this set became active
    pub active_from_block: BlockNumber,
}

impl ValidatorSet {
    /// Create a new empty validator set
    pub const fn new(epoch: u64, active_from_block: BlockNumber) -> Self {
        Self { members: BTreeSet::new(), epoch, active_from_block }
    }

    /// Create a validator set from a list of members
    pub fn from_members(
        members: impl IntoIterator<Item = StakerId>,
        epoch: u64,
        active_from_block: BlockNumber,
    ) -> Self {
        Self { members: members.into_iter().collect(), epoch, active_from_block }
    }

    /// Check if an identity is a member
    pub fn is_validator(&self, staker: &StakerId) -> bool {
        self.members.contains(staker)
    }

    /// Iterate over members
    pub fn iter(&self) -> impl Iterator<Item = &StakerId> + '_ {
        self.members.iter()
    }

    /// Members as a vector
    pub fn to_vec(&self) -> Vec<StakerId> {
        self.members.iter().copied().collect()
    }

    /// Get the number of members
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the set is empty
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Votes needed for a simple majority of this set
    pub fn consensus_threshold(&self) -> usize {
        majority_threshold(self.len())
    }
}

impl<'a> IntoIterator for &'a ValidatorSet {
    type Item = &'a StakerId;
    type IntoIter = std::collections::btree_set::Iter<'a, StakerId>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter()
    }
}
