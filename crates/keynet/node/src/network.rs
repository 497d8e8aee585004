//! All network state in one place

use alloy_primitives::{Address, Bytes, U256};
use keynet_config::NetworkConfig;
use keynet_permissions::{AuthMethod, AuthMethodType, KeyContext, KeyRegistry, PermissionRegistry};
use keynet_primitives::{BlockNumber, KeyHash, NodeId, StakerId};
use keynet_routing::{RoutingConsensus, RoutingData, VoteOutcome};
use keynet_staking::{
    CommsKeys, KickOutcome, KickVoteRetention, NodeEndpoint, Staking, StakingToken,
};
use tracing::{debug, info};

use crate::NodeError;

/// Staking, routing, key and permission state
#[derive(Debug)]
pub struct Network<T> {
    block: BlockNumber,
    staking: Staking<T>,
    routing: RoutingConsensus,
    keys: KeyRegistry,
    permissions: PermissionRegistry,
}

impl<T> Network<T> {
    /// Current block
    pub const fn block(&self) -> BlockNumber {
        self.block
    }

    // --- state access ---

    /// Staking and epoch state
    pub const fn staking(&self) -> &Staking<T> {
        &self.staking
    }

    /// Mutable staking state, for token funding and admin tooling
    pub const fn staking_mut(&mut self) -> &mut Staking<T> {
        &mut self.staking
    }

    /// Routing registrations
    pub const fn routing(&self) -> &RoutingConsensus {
        &self.routing
    }

    /// Minted keys
    pub const fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Granted permissions
    pub const fn permissions(&self) -> &PermissionRegistry {
        &self.permissions
    }
}

impl<T: StakingToken> Network<T> {
    /// Create a network at block `start_block`
    pub fn new(
        config: &NetworkConfig,
        token: T,
        start_block: BlockNumber,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        info!(
            target: "keynet::node",
            network = ?config.network,
            minimum_stake = %config.minimum_stake,
            epoch_length = config.epoch_length,
            start_block,
            "Network created"
        );
        Ok(Self {
            block: start_block,
            staking: Staking::new(config.staking_params(), token, start_block),
            routing: RoutingConsensus::new(),
            keys: KeyRegistry::new(),
            permissions: PermissionRegistry::with_scope_width(config.max_scope_width),
        })
    }

    // --- clock ---

    /// Move the block clock forward
    pub fn advance_block(&mut self, height: BlockNumber) -> Result<(), NodeError> {
        if height < self.block {
            return Err(NodeError::BlockRegression { current: self.block, requested: height });
        }
        self.block = height;
        debug!(target: "keynet::node", block = height, "Block advanced");
        Ok(())
    }

    // --- staking ---

    /// Deposit stake, returning the new balance
    pub fn stake(&mut self, caller: StakerId, amount: U256) -> Result<U256, NodeError> {
        Ok(self.staking.stake(caller, amount)?)
    }

    /// Withdraw part of the stake, returning the new balance
    pub fn withdraw(&mut self, caller: StakerId, amount: U256) -> Result<U256, NodeError> {
        Ok(self.staking.withdraw(caller, amount)?)
    }

    /// Pay out accrued reward
    pub fn claim_reward(&mut self, caller: StakerId) -> Result<U256, NodeError> {
        Ok(self.staking.claim_reward(caller)?)
    }

    /// Stake and queue a join
    pub fn stake_and_join(
        &mut self,
        caller: StakerId,
        amount: U256,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), NodeError> {
        Ok(self.staking.stake_and_join(caller, amount, node, endpoint, comms_keys)?)
    }

    /// Queue a join with stake already deposited
    pub fn request_to_join(
        &mut self,
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), NodeError> {
        Ok(self.staking.request_to_join(caller, node, endpoint, comms_keys)?)
    }

    /// Update node identity, endpoint and comms keys without queueing a join
    pub fn set_endpoint_and_comms_keys(
        &mut self,
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), NodeError> {
        Ok(self.staking.set_endpoint_and_comms_keys(caller, node, endpoint, comms_keys)?)
    }

    /// Queue a leave
    pub fn request_to_leave(&mut self, caller: StakerId) {
        self.staking.request_to_leave(caller);
    }

    /// Vote to kick a current validator
    pub fn kick_validator_in_next_epoch(
        &mut self,
        caller: NodeId,
        target: StakerId,
    ) -> Result<KickOutcome, NodeError> {
        Ok(self.staking.kick_validator_in_next_epoch(caller, target)?)
    }

    /// Lock the next validator set
    pub fn lock_validators_for_next_epoch(&mut self) -> Result<Vec<StakerId>, NodeError> {
        Ok(self.staking.lock_validators_for_next_epoch()?)
    }

    /// Signal readiness for the locked set
    pub fn signal_ready_for_next_epoch(
        &mut self,
        caller: NodeId,
        epoch_number: u64,
    ) -> Result<bool, NodeError> {
        Ok(self.staking.signal_ready_for_next_epoch(caller, epoch_number)?)
    }

    /// Advance the epoch at the current block
    pub fn advance_epoch(&mut self) -> Result<u64, NodeError> {
        Ok(self.staking.advance_epoch(self.block)?)
    }

    /// Withdraw everything and leave
    pub fn exit(&mut self, caller: StakerId) -> Result<U256, NodeError> {
        Ok(self.staking.exit(caller)?)
    }

    // --- admin ---

    /// Change the minimum stake
    pub fn set_minimum_stake(&mut self, caller: Address, amount: U256) -> Result<(), NodeError> {
        Ok(self.staking.set_minimum_stake(caller, amount)?)
    }

    /// Change the epoch length
    pub fn set_epoch_length(&mut self, caller: Address, length: u64) -> Result<(), NodeError> {
        Ok(self.staking.set_epoch_length(caller, length)?)
    }

    /// Change the kick penalty
    pub fn set_kick_penalty_percent(
        &mut self,
        caller: Address,
        percent: u8,
    ) -> Result<(), NodeError> {
        Ok(self.staking.set_kick_penalty_percent(caller, percent)?)
    }

    /// Change kick vote retention
    pub fn set_kick_vote_retention(
        &mut self,
        caller: Address,
        retention: KickVoteRetention,
    ) -> Result<(), NodeError> {
        Ok(self.staking.set_kick_vote_retention(caller, retention)?)
    }

    /// Pause or resume the epoch handshake
    pub fn set_paused(&mut self, caller: Address, paused: bool) -> Result<(), NodeError> {
        Ok(self.staking.set_paused(caller, paused)?)
    }

    // --- routing ---

    /// Vote for a key's routing data
    pub fn vote_for_routing_data(
        &mut self,
        caller: NodeId,
        key_hash: KeyHash,
        data: RoutingData,
    ) -> Result<VoteOutcome, NodeError> {
        Ok(self.routing.vote_for_routing_data(caller, key_hash, data, &self.staking)?)
    }

    // --- keys ---

    /// Mint a routed key
    pub fn mint(&mut self, caller: Address, key_hash: KeyHash) -> Result<(), NodeError> {
        Ok(self.keys.mint(caller, key_hash, &self.routing)?)
    }

    /// Mint the next routed key of a type
    pub fn mint_next(&mut self, caller: Address, key_type: u8) -> Result<KeyHash, NodeError> {
        Ok(self.keys.mint_next(caller, key_type, &self.routing)?)
    }

    /// Burn a key and drop its permissions
    pub fn burn(&mut self, caller: Address, key_hash: KeyHash) -> Result<(), NodeError> {
        self.keys.burn(caller, key_hash)?;
        self.permissions.clear_key(&key_hash);
        Ok(())
    }

    /// Transfer a key
    pub fn transfer(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        to: Address,
    ) -> Result<(), NodeError> {
        Ok(self.keys.transfer(caller, key_hash, to)?)
    }

    // --- permissions ---

    /// Permit an address on a key
    pub fn add_permitted_address(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        address: Address,
        scopes: &[usize],
    ) -> Result<(), NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.add_permitted_address(
            &authority,
            caller,
            key_hash,
            address,
            scopes,
        )?)
    }

    /// Revoke an address
    pub fn remove_permitted_address(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        address: Address,
    ) -> Result<bool, NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.remove_permitted_address(&authority, caller, key_hash, address)?)
    }

    /// Permit an action on a key
    pub fn add_permitted_action(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        content_hash: Bytes,
        scopes: &[usize],
    ) -> Result<(), NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.add_permitted_action(
            &authority,
            caller,
            key_hash,
            content_hash,
            scopes,
        )?)
    }

    /// Revoke an action
    pub fn remove_permitted_action(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        content_hash: &[u8],
    ) -> Result<bool, NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.remove_permitted_action(
            &authority,
            caller,
            key_hash,
            content_hash,
        )?)
    }

    /// Permit an auth method on a key
    pub fn add_permitted_auth_method(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        method: AuthMethod,
        scopes: &[usize],
    ) -> Result<(), NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.add_permitted_auth_method(
            &authority,
            caller,
            key_hash,
            method,
            scopes,
        )?)
    }

    /// Revoke an auth method
    pub fn remove_permitted_auth_method(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
    ) -> Result<bool, NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.remove_permitted_auth_method(
            &authority,
            caller,
            key_hash,
            method_type,
            user_id,
        )?)
    }

    /// Set a scope bit on a permitted auth method
    pub fn add_permitted_auth_method_scope(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        scope: usize,
    ) -> Result<(), NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.add_permitted_auth_method_scope(
            &authority,
            caller,
            key_hash,
            method_type,
            user_id,
            scope,
        )?)
    }

    /// Clear a scope bit on a permitted auth method
    pub fn remove_permitted_auth_method_scope(
        &mut self,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        scope: usize,
    ) -> Result<(), NodeError> {
        let authority = KeyContext::new(&self.routing, &self.keys);
        Ok(self.permissions.remove_permitted_auth_method_scope(
            &authority,
            caller,
            key_hash,
            method_type,
            user_id,
            scope,
        )?)
    }
}
