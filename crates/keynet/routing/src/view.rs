//! Read access to the active validator set

use keynet_primitives::NodeId;
use keynet_staking::{Staking, StakingToken};

/// Source of validator authorization and the live vote threshold
pub trait ValidatorView {
    /// Check if a node identity belongs to a current validator
    fn is_active_validator(&self, node: &NodeId) -> bool;

    /// Size of the current validator set
    fn active_validator_count(&self) -> usize;
}

impl<T: StakingToken> ValidatorView for Staking<T> {
    fn is_active_validator(&self, node: &NodeId) -> bool {
        Self::is_active_validator(self, node)
    }

    fn active_validator_count(&self) -> usize {
        Self::active_validator_count(self)
    }
}
