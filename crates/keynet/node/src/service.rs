//! Single-writer network service

use alloy_primitives::{Address, Bytes, U256};
use keynet_permissions::{AuthMethod, AuthMethodType};
use keynet_primitives::{BlockNumber, KeyHash, NodeId, StakerId};
use keynet_routing::{RoutingData, VoteOutcome};
use keynet_staking::{CommsKeys, KickOutcome, NodeEndpoint, StakingToken};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{Network, NodeError};

/// Pending commands before senders wait
const COMMAND_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, NodeError>>;

/// Operation applied by the service loop
enum NetworkCommand<T> {
    AdvanceBlock {
        height: BlockNumber,
        response: Reply<()>,
    },
    Stake {
        caller: StakerId,
        amount: U256,
        response: Reply<U256>,
    },
    Withdraw {
        caller: StakerId,
        amount: U256,
        response: Reply<U256>,
    },
    ClaimReward {
        caller: StakerId,
        response: Reply<U256>,
    },
    StakeAndJoin {
        caller: StakerId,
        amount: U256,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
        response: Reply<()>,
    },
    RequestToJoin {
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
        response: Reply<()>,
    },
    SetEndpoint {
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
        response: Reply<()>,
    },
    RequestToLeave {
        caller: StakerId,
        response: Reply<()>,
    },
    KickValidator {
        caller: NodeId,
        target: StakerId,
        response: Reply<KickOutcome>,
    },
    LockValidators {
        response: Reply<Vec<StakerId>>,
    },
    SignalReady {
        caller: NodeId,
        epoch_number: u64,
        response: Reply<bool>,
    },
    AdvanceEpoch {
        response: Reply<u64>,
    },
    Exit {
        caller: StakerId,
        response: Reply<U256>,
    },
    SetMinimumStake {
        caller: Address,
        amount: U256,
        response: Reply<()>,
    },
    SetEpochLength {
        caller: Address,
        length: u64,
        response: Reply<()>,
    },
    SetKickPenaltyPercent {
        caller: Address,
        percent: u8,
        response: Reply<()>,
    },
    SetPaused {
        caller: Address,
        paused: bool,
        response: Reply<()>,
    },
    VoteForRoutingData {
        caller: NodeId,
        key_hash: KeyHash,
        data: RoutingData,
        response: Reply<VoteOutcome>,
    },
    Mint {
        caller: Address,
        key_hash: KeyHash,
        response: Reply<()>,
    },
    MintNext {
        caller: Address,
        key_type: u8,
        response: Reply<KeyHash>,
    },
    Burn {
        caller: Address,
        key_hash: KeyHash,
        response: Reply<()>,
    },
    Transfer {
        caller: Address,
        key_hash: KeyHash,
        to: Address,
        response: Reply<()>,
    },
    AddPermittedAddress {
        caller: Address,
        key_hash: KeyHash,
        address: Address,
        scopes: Vec<usize>,
        response: Reply<()>,
    },
    RemovePermittedAddress {
        caller: Address,
        key_hash: KeyHash,
        address: Address,
        response: Reply<bool>,
    },
    AddPermittedAction {
        caller: Address,
        key_hash: KeyHash,
        content_hash: Bytes,
        scopes: Vec<usize>,
        response: Reply<()>,
    },
    RemovePermittedAction {
        caller: Address,
        key_hash: KeyHash,
        content_hash: Bytes,
        response: Reply<bool>,
    },
    AddPermittedAuthMethod {
        caller: Address,
        key_hash: KeyHash,
        method: AuthMethod,
        scopes: Vec<usize>,
        response: Reply<()>,
    },
    RemovePermittedAuthMethod {
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        response: Reply<bool>,
    },
    AddScope {
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        scope: usize,
        response: Reply<()>,
    },
    RemoveScope {
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        scope: usize,
        response: Reply<()>,
    },
    /// Run a closure against the state; used for views and tooling
    Apply(Box<dyn FnOnce(&mut Network<T>) + Send>),
    Shutdown,
}

/// Owns the [`Network`] and applies commands one at a time
pub struct NetworkService<T> {
    network: Network<T>,
    commands: mpsc::Receiver<NetworkCommand<T>>,
}

impl<T> std::fmt::Debug for NetworkService<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkService")
            .field("block", &self.network.block())
            .finish_non_exhaustive()
    }
}

impl<T: StakingToken + Send + 'static> NetworkService<T> {
    /// Create the service and its handle
    pub fn new(network: Network<T>) -> (Self, NetworkHandle<T>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        (Self { network, commands: command_rx }, NetworkHandle { commands: command_tx })
    }

    /// Spawn the service loop on the current runtime
    pub fn spawn(network: Network<T>) -> (JoinHandle<Network<T>>, NetworkHandle<T>) {
        let (service, handle) = Self::new(network);
        (tokio::spawn(service.run()), handle)
    }

    /// Apply commands until shutdown or until every handle is dropped; returns the state
    pub async fn run(mut self) -> Network<T> {
        info!(target: "keynet::service", block = self.network.block(), "Network service started");
        while let Some(command) = self.commands.recv().await {
            if self.handle_command(command) {
                break;
            }
        }
        info!(target: "keynet::service", block = self.network.block(), "Network service stopped");
        self.network
    }

    /// Returns true on shutdown
    fn handle_command(&mut self, command: NetworkCommand<T>) -> bool {
        let network = &mut self.network;
        match command {
            NetworkCommand::AdvanceBlock { height, response } => {
                let _ = response.send(network.advance_block(height));
            }
            NetworkCommand::Stake { caller, amount, response } => {
                let _ = response.send(network.stake(caller, amount));
            }
            NetworkCommand::Withdraw { caller, amount, response } => {
                let _ = response.send(network.withdraw(caller, amount));
            }
            NetworkCommand::ClaimReward { caller, response } => {
                let _ = response.send(network.claim_reward(caller));
            }
            NetworkCommand::StakeAndJoin {
                caller,
                amount,
                node,
                endpoint,
                comms_keys,
                response,
            } => {
                let result = network.stake_and_join(caller, amount, node, endpoint, comms_keys);
                let _ = response.send(result);
            }
            NetworkCommand::RequestToJoin { caller, node, endpoint, comms_keys, response } => {
                let _ = response.send(network.request_to_join(caller, node, endpoint, comms_keys));
            }
            NetworkCommand::SetEndpoint { caller, node, endpoint, comms_keys, response } => {
                let _ = response.send(network.set_endpoint_and_comms_keys(
                    caller,
                    node,
                    endpoint,
                    comms_keys,
                ));
            }
            NetworkCommand::RequestToLeave { caller, response } => {
                network.request_to_leave(caller);
                let _ = response.send(Ok(()));
            }
            NetworkCommand::KickValidator { caller, target, response } => {
                let _ = response.send(network.kick_validator_in_next_epoch(caller, target));
            }
            NetworkCommand::LockValidators { response } => {
                let _ = response.send(network.lock_validators_for_next_epoch());
            }
            NetworkCommand::SignalReady { caller, epoch_number, response } => {
                let _ = response.send(network.signal_ready_for_next_epoch(caller, epoch_number));
            }
            NetworkCommand::AdvanceEpoch { response } => {
                let _ = response.send(network.advance_epoch());
            }
            NetworkCommand::Exit { caller, response } => {
                let _ = response.send(network.exit(caller));
            }
            NetworkCommand::SetMinimumStake { caller, amount, response } => {
                let _ = response.send(network.set_minimum_stake(caller, amount));
            }
            NetworkCommand::SetEpochLength { caller, length, response } => {
                let _ = response.send(network.set_epoch_length(caller, length));
            }
            NetworkCommand::SetKickPenaltyPercent { caller, percent, response } => {
                let _ = response.send(network.set_kick_penalty_percent(caller, percent));
            }
            NetworkCommand::SetPaused { caller, paused, response } => {
                let _ = response.send(network.set_paused(caller, paused));
            }
            NetworkCommand::VoteForRoutingData { caller, key_hash, data, response } => {
                let _ = response.send(network.vote_for_routing_data(caller, key_hash, data));
            }
            NetworkCommand::Mint { caller, key_hash, response } => {
                let _ = response.send(network.mint(caller, key_hash));
            }
            NetworkCommand::MintNext { caller, key_type, response } => {
                let _ = response.send(network.mint_next(caller, key_type));
            }
            NetworkCommand::Burn { caller, key_hash, response } => {
                let _ = response.send(network.burn(caller, key_hash));
            }
            NetworkCommand::Transfer { caller, key_hash, to, response } => {
                let _ = response.send(network.transfer(caller, key_hash, to));
            }
            NetworkCommand::AddPermittedAddress { caller, key_hash, address, scopes, response } => {
                let result = network.add_permitted_address(caller, key_hash, address, &scopes);
                let _ = response.send(result);
            }
            NetworkCommand::RemovePermittedAddress { caller, key_hash, address, response } => {
                let _ = response.send(network.remove_permitted_address(caller, key_hash, address));
            }
            NetworkCommand::AddPermittedAction {
                caller,
                key_hash,
                content_hash,
                scopes,
                response,
            } => {
                let result = network.add_permitted_action(caller, key_hash, content_hash, &scopes);
                let _ = response.send(result);
            }
            NetworkCommand::RemovePermittedAction { caller, key_hash, content_hash, response } => {
                let result = network.remove_permitted_action(caller, key_hash, &content_hash);
                let _ = response.send(result);
            }
            NetworkCommand::AddPermittedAuthMethod {
                caller,
                key_hash,
                method,
                scopes,
                response,
            } => {
                let result = network.add_permitted_auth_method(caller, key_hash, method, &scopes);
                let _ = response.send(result);
            }
            NetworkCommand::RemovePermittedAuthMethod {
                caller,
                key_hash,
                method_type,
                user_id,
                response,
            } => {
                let _ = response.send(network.remove_permitted_auth_method(
                    caller,
                    key_hash,
                    method_type,
                    &user_id,
                ));
            }
            NetworkCommand::AddScope {
                caller,
                key_hash,
                method_type,
                user_id,
                scope,
                response,
            } => {
                let _ = response.send(network.add_permitted_auth_method_scope(
                    caller,
                    key_hash,
                    method_type,
                    &user_id,
                    scope,
                ));
            }
            NetworkCommand::RemoveScope {
                caller,
                key_hash,
                method_type,
                user_id,
                scope,
                response,
            } => {
                let _ = response.send(network.remove_permitted_auth_method_scope(
                    caller,
                    key_hash,
                    method_type,
                    &user_id,
                    scope,
                ));
            }
            NetworkCommand::Apply(apply) => apply(network),
            NetworkCommand::Shutdown => {
                debug!(target: "keynet::service", "Shutdown requested");
                return true;
            }
        }
        false
    }
}

/// Cloneable client of a [`NetworkService`]
pub struct NetworkHandle<T> {
    commands: mpsc::Sender<NetworkCommand<T>>,
}

impl<T> Clone for NetworkHandle<T> {
    fn clone(&self) -> Self {
        Self { commands: self.commands.clone() }
    }
}

impl<T> std::fmt::Debug for NetworkHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkHandle").field("closed", &self.commands.is_closed()).finish()
    }
}

impl<T: StakingToken + Send + 'static> NetworkHandle<T> {
    async fn request<R>(
        &self,
        command: impl FnOnce(Reply<R>) -> NetworkCommand<T>,
    ) -> Result<R, NodeError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(command(tx)).await.map_err(|_| NodeError::ServiceStopped)?;
        rx.await.map_err(|_| NodeError::ServiceStopped)?
    }

    /// Run `f` against the state inside the service loop and return its result
    pub async fn with_network<R, F>(&self, f: F) -> Result<R, NodeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Network<T>) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let apply = Box::new(move |network: &mut Network<T>| {
            let _ = tx.send(f(network));
        });
        self.commands
            .send(NetworkCommand::Apply(apply))
            .await
            .map_err(|_| NodeError::ServiceStopped)?;
        rx.await.map_err(|_| NodeError::ServiceStopped)
    }

    /// Stop the service loop
    pub async fn shutdown(&self) -> Result<(), NodeError> {
        self.commands.send(NetworkCommand::Shutdown).await.map_err(|_| NodeError::ServiceStopped)
    }

    /// Move the block clock forward
    pub async fn advance_block(&self, height: BlockNumber) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::AdvanceBlock { height, response }).await
    }

    // --- staking ---

    /// Deposit stake, returning the new balance
    pub async fn stake(&self, caller: StakerId, amount: U256) -> Result<U256, NodeError> {
        self.request(|response| NetworkCommand::Stake { caller, amount, response }).await
    }

    /// Withdraw part of the stake, returning the new balance
    pub async fn withdraw(&self, caller: StakerId, amount: U256) -> Result<U256, NodeError> {
        self.request(|response| NetworkCommand::Withdraw { caller, amount, response }).await
    }

    /// Pay out accrued reward
    pub async fn claim_reward(&self, caller: StakerId) -> Result<U256, NodeError> {
        self.request(|response| NetworkCommand::ClaimReward { caller, response }).await
    }

    /// Stake and queue a join
    pub async fn stake_and_join(
        &self,
        caller: StakerId,
        amount: U256,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::StakeAndJoin {
            caller,
            amount,
            node,
            endpoint,
            comms_keys,
            response,
        })
        .await
    }

    /// Queue a join with stake already deposited
    pub async fn request_to_join(
        &self,
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::RequestToJoin {
            caller,
            node,
            endpoint,
            comms_keys,
            response,
        })
        .await
    }

    /// Update node identity, endpoint and comms keys without queueing a join
    pub async fn set_endpoint_and_comms_keys(
        &self,
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::SetEndpoint {
            caller,
            node,
            endpoint,
            comms_keys,
            response,
        })
        .await
    }

    /// Queue a leave
    pub async fn request_to_leave(&self, caller: StakerId) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::RequestToLeave { caller, response }).await
    }

    /// Vote to kick a current validator
    pub async fn kick_validator_in_next_epoch(
        &self,
        caller: NodeId,
        target: StakerId,
    ) -> Result<KickOutcome, NodeError> {
        self.request(|response| NetworkCommand::KickValidator { caller, target, response }).await
    }

    /// Lock the next validator set
    pub async fn lock_validators_for_next_epoch(&self) -> Result<Vec<StakerId>, NodeError> {
        self.request(|response| NetworkCommand::LockValidators { response }).await
    }

    /// Signal readiness for the locked set
    pub async fn signal_ready_for_next_epoch(
        &self,
        caller: NodeId,
        epoch_number: u64,
    ) -> Result<bool, NodeError> {
        self.request(|response| NetworkCommand::SignalReady { caller, epoch_number, response })
            .await
    }

    /// Advance the epoch at the current block
    pub async fn advance_epoch(&self) -> Result<u64, NodeError> {
        self.request(|response| NetworkCommand::AdvanceEpoch { response }).await
    }

    /// Withdraw everything and leave
    pub async fn exit(&self, caller: StakerId) -> Result<U256, NodeError> {
        self.request(|response| NetworkCommand::Exit { caller, response }).await
    }

    /// Current epoch number
    pub async fn epoch_number(&self) -> Result<u64, NodeError> {
        self.with_network(|network| network.staking().epoch().number).await
    }

    /// Members of the current validator set
    pub async fn validators_in_current_epoch(&self) -> Result<Vec<StakerId>, NodeError> {
        self.with_network(|network| network.staking().validators_in_current_epoch()).await
    }

    /// Members of the next validator set
    pub async fn validators_in_next_epoch(&self) -> Result<Vec<StakerId>, NodeError> {
        self.with_network(|network| network.staking().validators_in_next_epoch()).await
    }

    /// Minimum stake
    pub async fn minimum_stake(&self) -> Result<U256, NodeError> {
        self.with_network(|network| network.staking().minimum_stake()).await
    }

    /// Staked balance of an identity
    pub async fn balance_of(&self, staker: StakerId) -> Result<U256, NodeError> {
        self.with_network(move |network| network.staking().balance_of(&staker)).await
    }

    /// Unclaimed reward of a staker
    pub async fn reward_of(&self, staker: StakerId) -> Result<U256, NodeError> {
        self.with_network(move |network| network.staking().reward_of(&staker)).await
    }

    // --- admin ---

    /// Change the minimum stake
    pub async fn set_minimum_stake(&self, caller: Address, amount: U256) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::SetMinimumStake { caller, amount, response }).await
    }

    /// Change the epoch length
    pub async fn set_epoch_length(&self, caller: Address, length: u64) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::SetEpochLength { caller, length, response }).await
    }

    /// Change the kick penalty
    pub async fn set_kick_penalty_percent(
        &self,
        caller: Address,
        percent: u8,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::SetKickPenaltyPercent {
            caller,
            percent,
            response,
        })
        .await
    }

    /// Pause or resume the epoch handshake
    pub async fn set_paused(&self, caller: Address, paused: bool) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::SetPaused { caller, paused, response }).await
    }

    // --- routing ---

    /// Vote for a key's routing data
    pub async fn vote_for_routing_data(
        &self,
        caller: NodeId,
        key_hash: KeyHash,
        data: RoutingData,
    ) -> Result<VoteOutcome, NodeError> {
        self.request(|response| NetworkCommand::VoteForRoutingData {
            caller,
            key_hash,
            data,
            response,
        })
        .await
    }

    /// Committed routing data of a key
    pub async fn get_routing_data(
        &self,
        key_hash: KeyHash,
    ) -> Result<Option<RoutingData>, NodeError> {
        self.with_network(move |network| network.routing().get_routing_data(&key_hash).cloned())
            .await
    }

    /// Check if a key is routed
    pub async fn is_routed(&self, key_hash: KeyHash) -> Result<bool, NodeError> {
        self.with_network(move |network| network.routing().is_routed(&key_hash)).await
    }

    // --- keys ---

    /// Mint a routed key
    pub async fn mint(&self, caller: Address, key_hash: KeyHash) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::Mint { caller, key_hash, response }).await
    }

    /// Mint the next routed key of a type
    pub async fn mint_next(&self, caller: Address, key_type: u8) -> Result<KeyHash, NodeError> {
        self.request(|response| NetworkCommand::MintNext { caller, key_type, response }).await
    }

    /// Burn a key and drop its permissions
    pub async fn burn(&self, caller: Address, key_hash: KeyHash) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::Burn { caller, key_hash, response }).await
    }

    /// Transfer a key
    pub async fn transfer(
        &self,
        caller: Address,
        key_hash: KeyHash,
        to: Address,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::Transfer { caller, key_hash, to, response }).await
    }

    /// Owner of a key
    pub async fn owner_of(&self, key_hash: KeyHash) -> Result<Option<Address>, NodeError> {
        self.with_network(move |network| network.keys().owner_of(&key_hash)).await
    }

    // --- permissions ---

    /// Permit an address on a key
    pub async fn add_permitted_address(
        &self,
        caller: Address,
        key_hash: KeyHash,
        address: Address,
        scopes: Vec<usize>,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::AddPermittedAddress {
            caller,
            key_hash,
            address,
            scopes,
            response,
        })
        .await
    }

    /// Revoke an address
    pub async fn remove_permitted_address(
        &self,
        caller: Address,
        key_hash: KeyHash,
        address: Address,
    ) -> Result<bool, NodeError> {
        self.request(|response| NetworkCommand::RemovePermittedAddress {
            caller,
            key_hash,
            address,
            response,
        })
        .await
    }

    /// Permit an action on a key
    pub async fn add_permitted_action(
        &self,
        caller: Address,
        key_hash: KeyHash,
        content_hash: Bytes,
        scopes: Vec<usize>,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::AddPermittedAction {
            caller,
            key_hash,
            content_hash,
            scopes,
            response,
        })
        .await
    }

    /// Revoke an action
    pub async fn remove_permitted_action(
        &self,
        caller: Address,
        key_hash: KeyHash,
        content_hash: Bytes,
    ) -> Result<bool, NodeError> {
        self.request(|response| NetworkCommand::RemovePermittedAction {
            caller,
            key_hash,
            content_hash,
            response,
        })
        .await
    }

    /// Permit an auth method on a key
    pub async fn add_permitted_auth_method(
        &self,
        caller: Address,
        key_hash: KeyHash,
        method: AuthMethod,
        scopes: Vec<usize>,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::AddPermittedAuthMethod {
            caller,
            key_hash,
            method,
            scopes,
            response,
        })
        .await
    }

    /// Revoke an auth method
    pub async fn remove_permitted_auth_method(
        &self,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
    ) -> Result<bool, NodeError> {
        self.request(|response| NetworkCommand::RemovePermittedAuthMethod {
            caller,
            key_hash,
            method_type,
            user_id,
            response,
        })
        .await
    }

    /// Set a scope bit on a permitted auth method
    pub async fn add_permitted_auth_method_scope(
        &self,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        scope: usize,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::AddScope {
            caller,
            key_hash,
            method_type,
            user_id,
            scope,
            response,
        })
        .await
    }

    /// Clear a scope bit on a permitted auth method
    pub async fn remove_permitted_auth_method_scope(
        &self,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        scope: usize,
    ) -> Result<(), NodeError> {
        self.request(|response| NetworkCommand::RemoveScope {
            caller,
            key_hash,
            method_type,
            user_id,
            scope,
            response,
        })
        .await
    }

    /// Check if a scope bit is set on an auth method
    pub async fn is_permitted_auth_method_scope_present(
        &self,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        scope: usize,
    ) -> Result<bool, NodeError> {
        let present = self
            .with_network(move |network| {
                network.permissions().is_permitted_auth_method_scope_present(
                    &key_hash,
                    method_type,
                    &user_id,
                    scope,
                )
            })
            .await??;
        Ok(present)
    }

    /// The first `width` scope bits of an auth method
    pub async fn get_permitted_auth_method_scopes(
        &self,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
        width: usize,
    ) -> Result<Vec<bool>, NodeError> {
        let scopes = self
            .with_network(move |network| {
                network.permissions().get_permitted_auth_method_scopes(
                    &key_hash,
                    method_type,
                    &user_id,
                    width,
                )
            })
            .await??;
        Ok(scopes)
    }

    /// Check if an address is permitted on a key
    pub async fn is_permitted_address(
        &self,
        key_hash: KeyHash,
        address: Address,
    ) -> Result<bool, NodeError> {
        self.with_network(move |network| {
            network.permissions().is_permitted_address(&key_hash, &address)
        })
        .await
    }

    /// Check if an action is permitted on a key
    pub async fn is_permitted_action(
        &self,
        key_hash: KeyHash,
        content_hash: Bytes,
    ) -> Result<bool, NodeError> {
        self.with_network(move |network| {
            network.permissions().is_permitted_action(&key_hash, &content_hash)
        })
        .await
    }

    /// Check if an auth method is permitted on a key
    pub async fn is_permitted_auth_method(
        &self,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: Bytes,
    ) -> Result<bool, NodeError> {
        self.with_network(move |network| {
            network.permissions().is_permitted_auth_method(&key_hash, method_type, &user_id)
        })
        .await
    }

    /// Addresses permitted on a key
    pub async fn get_permitted_addresses(
        &self,
        key_hash: KeyHash,
    ) -> Result<Vec<Address>, NodeError> {
        self.with_network(move |network| network.permissions().get_permitted_addresses(&key_hash))
            .await
    }

    /// Actions permitted on a key
    pub async fn get_permitted_actions(&self, key_hash: KeyHash) -> Result<Vec<Bytes>, NodeError> {
        self.with_network(move |network| network.permissions().get_permitted_actions(&key_hash))
            .await
    }

    /// Auth methods permitted on a key
    pub async fn get_permitted_auth_methods(
        &self,
        key_hash: KeyHash,
    ) -> Result<Vec<AuthMethod>, NodeError> {
        self.with_network(move |network| {
            network.permissions().get_permitted_auth_methods(&key_hash)
        })
        .await
    }

    /// Keys permitting an auth method
    pub async fn get_key_hashes_for_auth_method(
        &self,
        method_type: AuthMethodType,
        user_id: Bytes,
    ) -> Result<Vec<KeyHash>, NodeError> {
        self.with_network(move |network| {
            network.permissions().get_key_hashes_for_auth_method(method_type, &user_id)
        })
        .await
    }

    /// Pubkey bound to an auth method, kept across revokes
    pub async fn get_user_pubkey_for_auth_method(
        &self,
        method_type: AuthMethodType,
        user_id: Bytes,
    ) -> Result<Option<Bytes>, NodeError> {
        self.with_network(move |network| {
            network.permissions().get_user_pubkey_for_auth_method(method_type, &user_id).cloned()
        })
        .await
    }
}
