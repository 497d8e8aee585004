//! Routing data submitted by validators

use alloy_primitives::{Address, Bytes, keccak256};
use keynet_primitives::KeyHash;
use serde::{Deserialize, Serialize};

use crate::RoutingError;

/// Longest accepted public key: an uncompressed secp256k1 point
pub const MAX_PUBKEY_LEN: usize = 65;

/// Where a key lives and what it is
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutingData {
    /// Public key bytes
    pub pubkey: Bytes,
    /// Staking contract whose validators hold the key shares
    pub staking_contract: Address,
    /// Key type tag
    pub key_type: u8,
}

impl RoutingData {
    /// Create routing data
    pub fn new(pubkey: impl Into<Bytes>, staking_contract: Address, key_type: u8) -> Self {
        Self { pubkey: pubkey.into(), staking_contract, key_type }
    }

    /// Key hash this data must be submitted under
    pub fn key_hash(&self) -> KeyHash {
        keccak256(&self.pubkey)
    }

    /// Check the public key length and that it hashes to `key_hash`
    pub fn validate(&self, key_hash: &KeyHash) -> Result<(), RoutingError> {
        let len = self.pubkey.len();
        if len == 0 || len > MAX_PUBKEY_LEN {
            return Err(RoutingError::InvalidKeyLength(len));
        }
        let computed = self.key_hash();
        if computed != *key_hash {
            return Err(RoutingError::KeyHashMismatch { key_hash: *key_hash, computed });
        }
        Ok(())
    }
}
