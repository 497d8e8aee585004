//! Kick votes against current validators

use alloy_primitives::U256;
use keynet_primitives::StakerId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::{StakingError, ValidatorSet};

/// Whether kick votes that did not reach quorum survive an epoch advance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KickVoteRetention {
    /// Votes are discarded when the epoch advances
    #[default]
    PerEpoch,
    /// Votes carry over; only votes from current validators count
    Persistent,
}

/// Result of a kick vote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickOutcome {
    /// Vote recorded, quorum not yet reached
    Recorded {
        /// Counted votes against the target
        votes: usize,
        /// Votes needed
        threshold: usize,
    },
    /// Quorum reached with this vote; target slashed and queued for removal
    Kicked {
        /// Stake burned
        slashed: U256,
    },
    /// Target already has a kick queued that no advance has applied yet
    AlreadyKicked,
}

/// Kick votes keyed by target
#[derive(Debug, Clone, Default)]
pub struct KickVotes {
    retention: KickVoteRetention,
    votes: HashMap<StakerId, BTreeSet<StakerId>>,
}

impl KickVotes {
    /// Create an empty tracker
    pub fn new(retention: KickVoteRetention) -> Self {
        Self { retention, ..Default::default() }
    }

    /// Change the retention policy
    pub const fn set_retention(&mut self, retention: KickVoteRetention) {
        self.retention = retention;
    }

    /// Record `voter`'s vote against `target`, returning the counted votes.
    ///
    /// Only voters that sit in `current` are counted.
    pub fn record(
        &mut self,
        voter: StakerId,
        target: StakerId,
        current: &ValidatorSet,
    ) -> Result<usize, StakingError> {
        let voters = self.votes.entry(target).or_default();
        if !voters.insert(voter) {
            return Err(StakingError::DuplicateKickVote { voter, target });
        }
        Ok(voters.iter().filter(|v| current.is_validator(v)).count())
    }

    /// Counted votes against a target
    pub fn count(&self, target: &StakerId, current: &ValidatorSet) -> usize {
        self.votes
            .get(target)
            .map(|voters| voters.iter().filter(|v| current.is_validator(v)).count())
            .unwrap_or(0)
    }

    /// Drop the votes against a target whose kick reached quorum
    pub fn clear_target(&mut self, target: &StakerId) {
        self.votes.remove(target);
    }

    /// Drop votes that do not survive an advance
    pub fn on_epoch_advance(&mut self) {
        if self.retention == KickVoteRetention::PerEpoch {
            self.votes.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::Address;
    use assert_matches::assert_matches;

    fn current(count: u8) -> ValidatorSet {
        ValidatorSet::from_members((1..=count).map(Address::repeat_byte), 1, 0)
    }

    #[test]
    fn test_duplicate_kick_vote_rejected() {
        let set = current(5);
        let mut votes = KickVotes::new(KickVoteRetention::PerEpoch);
        let target = Address::repeat_byte(5);

        assert_eq!(votes.record(Address::repeat_byte(1), target, &set).unwrap(), 1);
        assert_matches!(
            votes.record(Address::repeat_byte(1), target, &set),
            Err(StakingError::DuplicateKickVote { .. })
        );
    }

    #[test]
    fn test_per_epoch_retention_resets() {
        let set = current(5);
        let mut votes = KickVotes::new(KickVoteRetention::PerEpoch);
        let target = Address::repeat_byte(5);

        votes.record(Address::repeat_byte(1), target, &set).unwrap();
        votes.on_epoch_advance();
        assert_eq!(votes.count(&target, &set), 0);
    }

    #[test]
    fn test_persistent_retention_counts_current_voters_only() {
        let mut votes = KickVotes::new(KickVoteRetention::Persistent);
        let target = Address::repeat_byte(5);

        votes.record(Address::repeat_byte(1), target, &current(5)).unwrap();
        votes.record(Address::repeat_byte(2), target, &current(5)).unwrap();
        votes.on_epoch_advance();

        // voter 1 left the set
        let next = ValidatorSet::from_members((2..=5).map(Address::repeat_byte), 2, 1);
        assert_eq!(votes.count(&target, &next), 1);
    }

    #[test]
    fn test_cleared_target_starts_over() {
        let set = current(5);
        let mut votes = KickVotes::new(KickVoteRetention::Persistent);
        let target = Address::repeat_byte(5);

        votes.record(Address::repeat_byte(1), target, &set).unwrap();
        votes.clear_target(&target);
        assert_eq!(votes.count(&target, &set), 0);
        assert_eq!(votes.record(Address::repeat_byte(1), target, &set).unwrap(), 1);
    }
}
