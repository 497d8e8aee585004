//! Staking facade
//!
//! Resolves callers to staker identities, enforces stake requirements and drives the
//! ledger, registry, epoch coordinator and kick votes. Every operation either applies
//! all of its mutations or none of them.

use alloy_primitives::{Address, U256};
use keynet_primitives::{BlockNumber, NodeId, StakerId};
use tracing::{debug, info, warn};

use crate::{
    CommsKeys, Epoch, EpochCoordinator, EpochState, KickOutcome, KickVoteRetention, KickVotes,
    NodeEndpoint, StakeLedger, StakingError, StakingParams, StakingToken, Validator,
    ValidatorRegistry, ValidatorSet,
};

/// Validator lifecycle state behind one owner
#[derive(Debug)]
pub struct Staking<T> {
    params: StakingParams,
    ledger: StakeLedger,
    registry: ValidatorRegistry,
    epochs: EpochCoordinator,
    kicks: KickVotes,
    token: T,
}

impl<T: StakingToken> Staking<T> {
    /// Create with an empty validator set, the first epoch starting at `start_block`
    pub fn new(params: StakingParams, token: T, start_block: BlockNumber) -> Self {
        Self {
            ledger: StakeLedger::new(),
            registry: ValidatorRegistry::new(),
            epochs: EpochCoordinator::new(start_block, params.epoch_length),
            kicks: KickVotes::new(params.kick_vote_retention),
            params,
            token,
        }
    }

    // --- views ---

    /// Lifecycle parameters
    pub const fn params(&self) -> &StakingParams {
        &self.params
    }

    /// Stake every validator must keep
    pub const fn minimum_stake(&self) -> U256 {
        self.params.minimum_stake
    }

    /// The epoch record
    pub const fn epoch(&self) -> &Epoch {
        self.epochs.epoch()
    }

    /// Current handshake phase
    pub const fn state(&self) -> EpochState {
        self.epochs.state()
    }

    /// Check if the lifecycle is paused
    pub const fn is_paused(&self) -> bool {
        self.epochs.is_paused()
    }

    /// Staked balance of an identity
    pub fn balance_of(&self, staker: &StakerId) -> U256 {
        self.ledger.balance_of(staker)
    }

    /// Sum of all stake
    pub const fn total_staked(&self) -> U256 {
        self.ledger.total_staked()
    }

    /// Full validator view for a staker
    pub fn validator(&self, staker: &StakerId) -> Option<Validator> {
        self.registry
            .get(staker)
            .map(|record| Validator::from_record(record, self.ledger.balance_of(staker)))
    }

    /// Staker a node identity belongs to
    pub fn lookup_by_node(&self, node: &NodeId) -> Option<StakerId> {
        self.registry.lookup_by_node(node)
    }

    /// The current validator set
    pub const fn current_set(&self) -> &ValidatorSet {
        self.epochs.current()
    }

    /// Members of the current validator set
    pub fn validators_in_current_epoch(&self) -> Vec<StakerId> {
        self.epochs.current().to_vec()
    }

    /// Members of the next validator set: the locked set, or what a lock would produce now
    pub fn validators_in_next_epoch(&self) -> Vec<StakerId> {
        let ledger = &self.ledger;
        let registry = &self.registry;
        let minimum = self.params.minimum_stake;
        self.epochs
            .projected_next(|s| registry.contains(s) && ledger.balance_of(s) >= minimum)
            .to_vec()
    }

    /// Check if a node belongs to a staker in the current set
    pub fn is_active_validator(&self, node: &NodeId) -> bool {
        self.registry
            .lookup_by_node(node)
            .is_some_and(|staker| self.epochs.current().is_validator(&staker))
    }

    /// Size of the current validator set
    pub fn active_validator_count(&self) -> usize {
        self.epochs.current().len()
    }

    /// Counted kick votes against a target
    pub fn kick_votes(&self, target: &StakerId) -> usize {
        self.kicks.count(target, self.epochs.current())
    }

    /// Unclaimed reward of a staker
    pub fn reward_of(&self, staker: &StakerId) -> U256 {
        self.registry.get(staker).map(|r| r.reward).unwrap_or_default()
    }

    /// The token collaborator
    pub const fn token(&self) -> &T {
        &self.token
    }

    /// Mutable access to the token collaborator
    pub const fn token_mut(&mut self) -> &mut T {
        &mut self.token
    }

    // --- stake ---

    /// Stake `amount` for `caller`, returning the new balance
    pub fn stake(&mut self, caller: StakerId, amount: U256) -> Result<U256, StakingError> {
        let balance = self.ledger.deposit(caller, amount)?;
        if let Err(err) = self.token.pull(caller, amount) {
            let _ = self.ledger.withdraw(caller, amount);
            return Err(err.into());
        }
        Ok(balance)
    }

    /// Stake and queue a join in one call
    pub fn stake_and_join(
        &mut self,
        caller: StakerId,
        amount: U256,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), StakingError> {
        if amount.is_zero() {
            return Err(StakingError::ZeroAmount);
        }
        let balance = self.ledger.balance_of(&caller).saturating_add(amount);
        self.ensure_can_join(&caller, &node, balance)?;

        self.stake(caller, amount)?;
        self.apply_join(caller, node, endpoint, comms_keys)
    }

    /// Queue a join for the next lock
    pub fn request_to_join(
        &mut self,
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), StakingError> {
        self.ensure_can_join(&caller, &node, self.ledger.balance_of(&caller))?;
        self.apply_join(caller, node, endpoint, comms_keys)
    }

    /// Queue a leave for the next lock
    pub fn request_to_leave(&mut self, caller: StakerId) {
        self.epochs.request_leave(caller);
        debug!(target: "keynet::staking", staker = %caller, "Leave requested");
    }

    /// Update a registered staker's node identity, endpoint and comms keys.
    ///
    /// Queues no join and needs no minimum stake; the new node identity is what
    /// authorizes votes from now on.
    pub fn set_endpoint_and_comms_keys(
        &mut self,
        caller: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), StakingError> {
        if !self.registry.contains(&caller) {
            return Err(StakingError::NotRegistered(caller));
        }
        self.registry.register(caller, node, endpoint, comms_keys)
    }

    /// Withdraw part of the stake, returning the new balance.
    ///
    /// Validators, and stakers queued to join, must keep the minimum stake.
    pub fn withdraw(&mut self, caller: StakerId, amount: U256) -> Result<U256, StakingError> {
        if amount.is_zero() {
            return Err(StakingError::ZeroAmount);
        }
        let available = self.ledger.balance_of(&caller);
        if amount > available {
            return Err(StakingError::InsufficientBalance { requested: amount, available });
        }
        let remaining = available - amount;
        let bound = self.epochs.is_committed(&caller) || self.epochs.is_joining(&caller);
        if bound && remaining < self.params.minimum_stake {
            return Err(StakingError::InsufficientStake {
                balance: remaining,
                minimum: self.params.minimum_stake,
            });
        }

        self.ledger.withdraw(caller, amount)?;
        if let Err(err) = self.token.push(caller, amount) {
            let _ = self.ledger.deposit(caller, amount);
            return Err(err.into());
        }
        Ok(remaining)
    }

    /// Withdraw everything and drop the validator record, returning the amount withdrawn
    pub fn exit(&mut self, caller: StakerId) -> Result<U256, StakingError> {
        if self.epochs.is_committed(&caller) {
            return Err(StakingError::StillValidator(caller));
        }

        let balance = self.ledger.balance_of(&caller);
        if !balance.is_zero() {
            self.ledger.withdraw(caller, balance)?;
        }
        let record = self.registry.remove(&caller);
        let joining = self.epochs.is_joining(&caller);
        self.epochs.cancel_join(&caller);

        if !balance.is_zero() {
            if let Err(err) = self.token.push(caller, balance) {
                let _ = self.ledger.deposit(caller, balance);
                if let Some(record) = record {
                    self.registry.restore(record);
                }
                if joining {
                    self.epochs.request_join(caller);
                }
                return Err(err.into());
            }
        }

        info!(target: "keynet::staking", staker = %caller, amount = %balance, "Staker exited");
        Ok(balance)
    }

    /// Pay out accrued reward, returning the amount paid
    pub fn claim_reward(&mut self, caller: StakerId) -> Result<U256, StakingError> {
        let reward = self.registry.take_reward(&caller);
        if reward.is_zero() {
            return Ok(reward);
        }
        if let Err(err) = self.token.push(caller, reward) {
            self.registry.credit_reward(&caller, reward);
            return Err(err.into());
        }
        Ok(reward)
    }

    // --- epoch lifecycle ---

    /// Vote to kick `target` out of the next epoch.
    ///
    /// Once a majority of the current set agrees, the target is slashed immediately and
    /// queued for removal at the next lock.
    pub fn kick_validator_in_next_epoch(
        &mut self,
        caller: NodeId,
        target: StakerId,
    ) -> Result<KickOutcome, StakingError> {
        let voter = self.current_validator_for_node(&caller)?;
        if !self.epochs.current().is_validator(&target) {
            return Err(StakingError::NotCurrentValidator(target));
        }
        if self.epochs.is_kick_pending(&target) {
            return Ok(KickOutcome::AlreadyKicked);
        }

        let votes = self.kicks.record(voter, target, self.epochs.current())?;
        let threshold = self.epochs.current().consensus_threshold();
        if votes < threshold {
            debug!(
                target: "keynet::staking",
                %voter,
                %target,
                votes,
                threshold,
                "Kick vote recorded"
            );
            return Ok(KickOutcome::Recorded { votes, threshold });
        }

        self.kicks.clear_target(&target);
        self.epochs.mark_kicked(target);
        let slashed = self.ledger.slash(target, self.params.kick_penalty_percent);

        warn!(
            target: "keynet::staking",
            %target,
            votes,
            %slashed,
            balance = %self.ledger.balance_of(&target),
            "Validator kicked and slashed"
        );
        Ok(KickOutcome::Kicked { slashed })
    }

    /// Compute and lock the next validator set, returning its members
    pub fn lock_validators_for_next_epoch(&mut self) -> Result<Vec<StakerId>, StakingError> {
        let ledger = &self.ledger;
        let registry = &self.registry;
        let minimum = self.params.minimum_stake;
        let next =
            self.epochs.lock(|s| registry.contains(s) && ledger.balance_of(s) >= minimum)?;
        Ok(next.to_vec())
    }

    /// Signal that `caller`'s node is ready for the locked set; returns true once all are
    pub fn signal_ready_for_next_epoch(
        &mut self,
        caller: NodeId,
        epoch_number: u64,
    ) -> Result<bool, StakingError> {
        let staker =
            self.registry.lookup_by_node(&caller).ok_or(StakingError::UnknownNode(caller))?;
        self.epochs.signal_ready(staker, epoch_number)
    }

    /// Swap in the locked set at block `now`, returning the new epoch number
    pub fn advance_epoch(&mut self, now: BlockNumber) -> Result<u64, StakingError> {
        let outgoing = self.epochs.advance(now)?;
        self.kicks.on_epoch_advance();

        let reward = self.params.epoch_reward;
        if !reward.is_zero() {
            for staker in &outgoing {
                self.registry.credit_reward(staker, reward);
            }
        }
        Ok(self.epochs.epoch().number)
    }

    // --- admin ---

    /// Change the minimum stake
    pub fn set_minimum_stake(&mut self, caller: Address, amount: U256) -> Result<(), StakingError> {
        self.ensure_admin(&caller)?;
        if amount.is_zero() {
            return Err(StakingError::ZeroAmount);
        }
        self.params.minimum_stake = amount;
        info!(target: "keynet::staking", minimum_stake = %amount, "Minimum stake updated");
        Ok(())
    }

    /// Change the epoch length
    pub fn set_epoch_length(&mut self, caller: Address, length: u64) -> Result<(), StakingError> {
        self.ensure_admin(&caller)?;
        if length == 0 {
            return Err(StakingError::InvalidEpochLength);
        }
        self.params.epoch_length = length;
        self.epochs.set_epoch_length(length);
        info!(target: "keynet::staking", epoch_length = length, "Epoch length updated");
        Ok(())
    }

    /// Change the kick penalty
    pub fn set_kick_penalty_percent(
        &mut self,
        caller: Address,
        percent: u8,
    ) -> Result<(), StakingError> {
        self.ensure_admin(&caller)?;
        if percent > 100 {
            return Err(StakingError::InvalidPercent(percent));
        }
        self.params.kick_penalty_percent = percent;
        Ok(())
    }

    /// Change whether kick votes survive an epoch advance
    pub fn set_kick_vote_retention(
        &mut self,
        caller: Address,
        retention: KickVoteRetention,
    ) -> Result<(), StakingError> {
        self.ensure_admin(&caller)?;
        self.params.kick_vote_retention = retention;
        self.kicks.set_retention(retention);
        Ok(())
    }

    /// Pause or resume the lock/signal/advance handshake
    pub fn set_paused(&mut self, caller: Address, paused: bool) -> Result<(), StakingError> {
        self.ensure_admin(&caller)?;
        self.epochs.set_paused(paused);
        info!(target: "keynet::staking", paused, "Epoch lifecycle pause toggled");
        Ok(())
    }

    // --- helpers ---

    fn ensure_admin(&self, caller: &Address) -> Result<(), StakingError> {
        if *caller != self.params.admin {
            return Err(StakingError::NotAdmin(*caller));
        }
        Ok(())
    }

    fn current_validator_for_node(&self, node: &NodeId) -> Result<StakerId, StakingError> {
        self.registry
            .lookup_by_node(node)
            .filter(|staker| self.epochs.current().is_validator(staker))
            .ok_or(StakingError::NotCurrentValidator(*node))
    }

    fn ensure_can_join(
        &self,
        staker: &StakerId,
        node: &NodeId,
        balance: U256,
    ) -> Result<(), StakingError> {
        if balance < self.params.minimum_stake {
            return Err(StakingError::InsufficientStake {
                balance,
                minimum: self.params.minimum_stake,
            });
        }
        if self.epochs.is_kick_pending(staker) {
            return Err(StakingError::Kicked(*staker));
        }
        self.registry.ensure_node_available(staker, node)
    }

    fn apply_join(
        &mut self,
        staker: StakerId,
        node: NodeId,
        endpoint: NodeEndpoint,
        comms_keys: CommsKeys,
    ) -> Result<(), StakingError> {
        self.registry.register(staker, node, endpoint, comms_keys)?;
        self.epochs.request_join(staker);
        debug!(target: "keynet::staking", %staker, %node, "Join requested");
        Ok(())
    }
}
