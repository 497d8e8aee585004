//! Fungible staking token collaborator
//!
//! Stake moves between an account and the staking vault. Token transfer semantics are
//! owned by the token itself; the staking logic only needs these two calls.

use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use thiserror::Error;

/// Token transfer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Source account cannot cover the transfer
    #[error("Account {account} holds {balance}, cannot transfer {requested}")]
    InsufficientFunds {
        /// Source account
        account: Address,
        /// Its balance
        balance: U256,
        /// Requested amount
        requested: U256,
    },
}

/// Transfers between accounts and the staking vault
pub trait StakingToken {
    /// Move `amount` from `from` into the vault
    fn pull(&mut self, from: Address, amount: U256) -> Result<(), TokenError>;

    /// Move `amount` from the vault to `to`
    fn push(&mut self, to: Address, amount: U256) -> Result<(), TokenError>;
}

/// In-memory token balances
#[derive(Debug, Clone)]
pub struct InMemoryToken {
    vault: Address,
    balances: HashMap<Address, U256>,
}

impl InMemoryToken {
    /// Create a token whose vault account is `vault`
    pub fn new(vault: Address) -> Self {
        Self { vault, balances: HashMap::new() }
    }

    /// Credit new tokens to an account
    pub fn mint(&mut self, to: Address, amount: U256) {
        let balance = self.balances.entry(to).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Token balance of an account
    pub fn balance_of(&self, account: &Address) -> U256 {
        self.balances.get(account).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        let balance = self.balance_of(&from);
        if balance < amount {
            return Err(TokenError::InsufficientFunds { account: from, balance, requested: amount });
        }
        self.balances.insert(from, balance - amount);
        self.mint(to, amount);
        Ok(())
    }
}

impl Default for InMemoryToken {
    fn default() -> Self {
        Self::new(Address::ZERO)
    }
}

impl StakingToken for InMemoryToken {
    fn pull(&mut self, from: Address, amount: U256) -> Result<(), TokenError> {
        self.transfer(from, self.vault, amount)
    }

    fn push(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        self.transfer(self.vault, to, amount)
    }
}
