//! Minted key ownership

use alloy_primitives::Address;
use keynet_primitives::KeyHash;
use keynet_routing::RoutingConsensus;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::PermissionError;

/// Owners of minted keys
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    owners: HashMap<KeyHash, Address>,
    /// Every key ever minted, burned ones included
    minted: HashSet<KeyHash>,
}

impl KeyRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a routed key to `to`
    pub fn mint(
        &mut self,
        to: Address,
        key_hash: KeyHash,
        routing: &RoutingConsensus,
    ) -> Result<(), PermissionError> {
        if !routing.is_routed(&key_hash) {
            return Err(PermissionError::NotRouted(key_hash));
        }
        if self.minted.contains(&key_hash) {
            return Err(PermissionError::AlreadyMinted(key_hash));
        }

        self.minted.insert(key_hash);
        self.owners.insert(key_hash, to);
        info!(target: "keynet::keys", %key_hash, owner = %to, "Key minted");
        Ok(())
    }

    /// Mint the first routed, never minted key of `key_type`
    pub fn mint_next(
        &mut self,
        to: Address,
        key_type: u8,
        routing: &RoutingConsensus,
    ) -> Result<KeyHash, PermissionError> {
        let key_hash = routing
            .routed_keys(key_type)
            .find(|key_hash| !self.minted.contains(key_hash))
            .ok_or(PermissionError::NothingToMint(key_type))?;
        self.mint(to, key_hash, routing)?;
        Ok(key_hash)
    }

    /// Burn a key owned by `caller`
    pub fn burn(&mut self, caller: Address, key_hash: KeyHash) -> Result<(), PermissionError> {
        self.ensure_owner(caller, key_hash)?;
        self.owners.remove(&key_hash);
        info!(target: "keynet::keys", %key_hash, "Key burned");
        Ok(())
    }

    /// Transfer a key owned by `caller` to `to`
    pub fn transfer(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        to: Address,
    ) -> Result<(), PermissionError> {
        self.ensure_owner(caller, key_hash)?;
        self.owners.insert(key_hash, to);
        debug!(target: "keynet::keys", %key_hash, from = %caller, %to, "Key transferred");
        Ok(())
    }

    /// Owner of a key
    pub fn owner_of(&self, key_hash: &KeyHash) -> Option<Address> {
        self.owners.get(key_hash).copied()
    }

    /// Check if a key is minted and not burned
    pub fn exists(&self, key_hash: &KeyHash) -> bool {
        self.owners.contains_key(key_hash)
    }

    fn ensure_owner(&self, caller: Address, key_hash: KeyHash) -> Result<(), PermissionError> {
        match self.owners.get(&key_hash) {
            None => Err(PermissionError::UnknownKey(key_hash)),
            Some(owner) if *owner != caller => {
                Err(PermissionError::Unauthorized { caller, key_hash })
            }
            Some(_) => Ok(()),
        }
    }
}
