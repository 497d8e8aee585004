//! Staked balances.
//!
//! The ledger performs no authorization; callers have already checked ownership.

use alloy_primitives::U256;
use keynet_primitives::StakerId;
use std::collections::HashMap;
use tracing::debug;

use crate::StakingError;

/// Per-identity staked balances plus the global total.
#[derive(Debug, Clone, Default)]
pub struct StakeLedger {
    balances: HashMap<StakerId, U256>,
    total_staked: U256,
}

impl StakeLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Staked balance of an identity
    pub fn balance_of(&self, identity: &StakerId) -> U256 {
        self.balances.get(identity).copied().unwrap_or_default()
    }

    /// Sum of all staked balances
    pub const fn total_staked(&self) -> U256 {
        self.total_staked
    }

    /// Credit stake, returning the new balance
    pub fn deposit(&mut self, identity: StakerId, amount: U256) -> Result<U256, StakingError> {
        if amount.is_zero() {
            return Err(StakingError::ZeroAmount);
        }

        let balance = self.balance_of(&identity).saturating_add(amount);
        self.balances.insert(identity, balance);
        self.total_staked = self.total_staked.saturating_add(amount);

        debug!(target: "keynet::staking", %identity, %amount, %balance, "Stake deposited");
        Ok(balance)
    }

    /// Debit stake, returning the new balance
    pub fn withdraw(&mut self, identity: StakerId, amount: U256) -> Result<U256, StakingError> {
        if amount.is_zero() {
            return Err(StakingError::ZeroAmount);
        }

        let available = self.balance_of(&identity);
        if amount > available {
            return Err(StakingError::InsufficientBalance { requested: amount, available });
        }

        let remaining = available - amount;
        if remaining.is_zero() {
            self.balances.remove(&identity);
        } else {
            self.balances.insert(identity, remaining);
        }
        self.total_staked = self.total_staked.saturating_sub(amount);

        debug!(
            target: "keynet::staking",
            %identity,
            %amount,
            balance = %remaining,
            "Stake withdrawn"
        );
        Ok(remaining)
    }

    /// Burn `balance * percent / 100` of an identity's stake, returning the slashed amount
    pub fn slash(&mut self, identity: StakerId, percent: u8) -> U256 {
        let Some(balance) = self.balances.get_mut(&identity) else {
            return U256::ZERO;
        };

        let penalty = *balance * U256::from(percent.min(100)) / U256::from(100u8);
        *balance -= penalty;
        self.total_staked = self.total_staked.saturating_sub(penalty);
        penalty
    }
}
