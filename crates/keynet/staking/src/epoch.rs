//! Epoch state machine and double-buffered validator sets

use keynet_primitives::{BlockNumber, StakerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::{StakingError, ValidatorSet, defaults};

/// Phase of the epoch handshake
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochState {
    /// Normal operation; requests accumulate
    #[default]
    Active,
    /// Next set computed; waiting for its members to signal
    NextSetLocked,
    /// Every member of the next set signaled
    ReadyForAdvance,
}

/// The single epoch record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Epoch {
    /// Epoch number
    pub number: u64,
    /// Block the epoch started at
    pub start_block: BlockNumber,
    /// Length in blocks
    pub length: u64,
    /// Block the epoch is scheduled to end at
    pub end_block: BlockNumber,
    /// Handshake phase
    pub state: EpochState,
}

impl Epoch {
    /// Create the first epoch
    pub const fn genesis(start_block: BlockNumber, length: u64) -> Self {
        Self {
            number: defaults::GENESIS_EPOCH,
            start_block,
            length,
            end_block: start_block.saturating_add(length),
            state: EpochState::Active,
        }
    }
}

/// Join, leave and kick requests not yet applied to a validator set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingRequests {
    /// Identities asking to join
    pub joiners: BTreeSet<StakerId>,
    /// Identities asking to leave
    pub leavers: BTreeSet<StakerId>,
    /// Identities kicked by quorum
    pub kicked: BTreeSet<StakerId>,
}

impl PendingRequests {
    /// Queue a join, cancelling an earlier leave
    pub fn join(&mut self, staker: StakerId) {
        self.leavers.remove(&staker);
        self.joiners.insert(staker);
    }

    /// Queue a leave, cancelling an earlier join
    pub fn leave(&mut self, staker: StakerId) {
        self.joiners.remove(&staker);
        self.leavers.insert(staker);
    }

    /// Queue a kick, cancelling an earlier join
    pub fn kick(&mut self, staker: StakerId) {
        self.joiners.remove(&staker);
        self.kicked.insert(staker);
    }

    /// Fold later requests on top of these
    pub fn absorb(&mut self, later: Self) {
        later.joiners.into_iter().for_each(|s| self.join(s));
        later.leavers.into_iter().for_each(|s| self.leave(s));
        later.kicked.into_iter().for_each(|s| self.kick(s));
    }

    /// Apply to `base`: `base ∪ joiners \ leavers \ kicked`
    pub fn apply_to(&self, base: &ValidatorSet) -> BTreeSet<StakerId> {
        base.iter()
            .chain(self.joiners.iter())
            .filter(|s| !self.leavers.contains(*s) && !self.kicked.contains(*s))
            .copied()
            .collect()
    }
}

/// Phased coordinator owning the epoch record and both validator sets.
///
/// Performs no authorization: the [`Staking`](crate::Staking) facade resolves callers
/// before invoking it.
#[derive(Debug, Clone)]
pub struct EpochCoordinator {
    epoch: Epoch,
    current: ValidatorSet,
    next: Option<ValidatorSet>,
    /// Requests received since the last lock
    pending: PendingRequests,
    /// Requests consumed by locks in this epoch
    staged: PendingRequests,
    ready: BTreeSet<StakerId>,
    paused: bool,
}

impl EpochCoordinator {
    /// Create a coordinator with an empty current set
    pub fn new(start_block: BlockNumber, epoch_length: u64) -> Self {
        let epoch = Epoch::genesis(start_block, epoch_length);
        Self {
            current: ValidatorSet::new(epoch.number, start_block),
            epoch,
            next: None,
            pending: PendingRequests::default(),
            staged: PendingRequests::default(),
            ready: BTreeSet::new(),
            paused: false,
        }
    }

    /// The epoch record
    pub const fn epoch(&self) -> &Epoch {
        &self.epoch
    }

    /// Current handshake phase
    pub const fn state(&self) -> EpochState {
        self.epoch.state
    }

    /// The authoritative validator set
    pub const fn current(&self) -> &ValidatorSet {
        &self.current
    }

    /// The locked next set, if any
    pub const fn locked_next(&self) -> Option<&ValidatorSet> {
        self.next.as_ref()
    }

    /// Check if the lifecycle is paused
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Pause or resume the lifecycle
    pub const fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Change the epoch length; the running epoch keeps its end block
    pub const fn set_epoch_length(&mut self, length: u64) {
        self.epoch.length = length;
    }

    /// Identities that signaled ready for the locked set
    pub const fn ready_signals(&self) -> &BTreeSet<StakerId> {
        &self.ready
    }

    /// Check if a staker is queued to join
    pub fn is_joining(&self, staker: &StakerId) -> bool {
        self.pending.joiners.contains(staker) || self.staged.joiners.contains(staker)
    }

    /// Check if a kick against a staker is queued and not yet applied by an advance
    pub fn is_kick_pending(&self, staker: &StakerId) -> bool {
        self.pending.kicked.contains(staker) || self.staged.kicked.contains(staker)
    }

    /// Check if a staker is in the current or the locked next set
    pub fn is_committed(&self, staker: &StakerId) -> bool {
        self.current.is_validator(staker) ||
            self.next.as_ref().is_some_and(|next| next.is_validator(staker))
    }

    /// Queue a join
    pub fn request_join(&mut self, staker: StakerId) {
        self.pending.join(staker);
    }

    /// Queue a leave
    pub fn request_leave(&mut self, staker: StakerId) {
        self.pending.leave(staker);
    }

    /// Queue a kicked identity for removal
    pub fn mark_kicked(&mut self, staker: StakerId) {
        self.pending.kick(staker);
    }

    /// Drop any queued join for an identity
    pub fn cancel_join(&mut self, staker: &StakerId) {
        self.pending.joiners.remove(staker);
        self.staged.joiners.remove(staker);
    }

    /// The locked next set, or the set a lock would produce now, filtered by `eligible`
    pub fn projected_next(&self, eligible: impl Fn(&StakerId) -> bool) -> ValidatorSet {
        if let Some(next) = &self.next {
            return next.clone();
        }

        let mut requests = self.staged.clone();
        requests.absorb(self.pending.clone());
        ValidatorSet::from_members(
            requests.apply_to(&self.current).into_iter().filter(|s| eligible(s)),
            self.epoch.number + 1,
            self.epoch.end_block,
        )
    }

    /// Compute and lock the next validator set.
    ///
    /// Re-locking before advance recomputes from every request consumed so far plus any
    /// that arrived since. Members for which `eligible` is false are left out.
    pub fn lock(
        &mut self,
        eligible: impl Fn(&StakerId) -> bool,
    ) -> Result<&ValidatorSet, StakingError> {
        if self.paused {
            return Err(StakingError::Paused);
        }

        let pending = std::mem::take(&mut self.pending);
        self.staged.absorb(pending);

        let members: BTreeSet<_> =
            self.staged.apply_to(&self.current).into_iter().filter(|s| eligible(s)).collect();
        let next = ValidatorSet::from_members(members, self.epoch.number + 1, self.epoch.end_block);

        self.ready.clear();
        self.epoch.state =
            if next.is_empty() { EpochState::ReadyForAdvance } else { EpochState::NextSetLocked };

        info!(
            target: "keynet::epoch",
            epoch = self.epoch.number,
            current = self.current.len(),
            next = next.len(),
            joiners = self.staged.joiners.len(),
            leavers = self.staged.leavers.len(),
            kicked = self.staged.kicked.len(),
            "Validators locked for next epoch"
        );

        Ok(self.next.insert(next))
    }

    /// Record a ready signal; returns true when this signal completed the set
    pub fn signal_ready(
        &mut self,
        staker: StakerId,
        epoch_number: u64,
    ) -> Result<bool, StakingError> {
        if self.paused {
            return Err(StakingError::Paused);
        }
        if self.epoch.state != EpochState::NextSetLocked {
            return Err(StakingError::WrongState {
                operation: "signal ready",
                state: self.epoch.state,
            });
        }
        if epoch_number != self.epoch.number {
            return Err(StakingError::EpochMismatch {
                expected: self.epoch.number,
                actual: epoch_number,
            });
        }

        let Some(next) = &self.next else {
            return Err(StakingError::WrongState {
                operation: "signal ready",
                state: self.epoch.state,
            });
        };
        if !next.is_validator(&staker) {
            return Err(StakingError::NotInNextSet(staker));
        }

        self.ready.insert(staker);
        debug!(
            target: "keynet::epoch",
            %staker,
            ready = self.ready.len(),
            needed = next.len(),
            "Ready signal recorded"
        );

        if self.ready.len() == next.len() {
            self.epoch.state = EpochState::ReadyForAdvance;
            info!(target: "keynet::epoch", epoch = self.epoch.number, "All next validators ready");
            return Ok(true);
        }
        Ok(false)
    }

    /// Swap the locked set in, returning the outgoing set
    pub fn advance(&mut self, now: BlockNumber) -> Result<ValidatorSet, StakingError> {
        if self.paused {
            return Err(StakingError::Paused);
        }
        if self.epoch.state != EpochState::ReadyForAdvance {
            return Err(StakingError::WrongState { operation: "advance", state: self.epoch.state });
        }

        let mut incoming = self.next.take().unwrap_or_default();
        incoming.epoch = self.epoch.number + 1;
        incoming.active_from_block = now;
        let outgoing = std::mem::replace(&mut self.current, incoming);

        self.epoch.number += 1;
        self.epoch.start_block = now;
        self.epoch.end_block = self.epoch.end_block.saturating_add(self.epoch.length);
        self.epoch.state = EpochState::Active;
        self.staged = PendingRequests::default();
        self.ready.clear();

        info!(
            target: "keynet::epoch",
            epoch = self.epoch.number,
            start_block = now,
            validators = self.current.len(),
            "Epoch advanced"
        );
        Ok(outgoing)
    }
}
