//! KeyNet Staking & Epoch Lifecycle
//!
//! This crate holds every piece of validator-set state: the stake ledger, the
//! staker/node registry and the phased epoch coordinator that swaps the validator set.
//!
//! # Epoch handshake
//!
//! ```text
//! Active ──lock──▶ NextSetLocked ──all of next signal──▶ ReadyForAdvance
//!   ▲                                                          │
//!   └───────────────────────── advance ◀──────────────────────┘
//!
//! next = current ∪ joiners \ leavers \ kicked    (computed at lock)
//! ```
//!
//! Join, leave and kick requests are accepted in every phase. Requests that arrive
//! after a lock are folded into the next lock.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod epoch;
pub mod kick;
pub mod ledger;
pub mod registry;
pub mod staking;
pub mod token;
pub mod validator;

pub use epoch::{Epoch, EpochCoordinator, EpochState, PendingRequests};
pub use kick::{KickOutcome, KickVoteRetention, KickVotes};
pub use ledger::StakeLedger;
pub use registry::{CommsKeys, NodeEndpoint, Validator, ValidatorRecord, ValidatorRegistry};
pub use staking::Staking;
pub use token::{InMemoryToken, StakingToken, TokenError};
pub use validator::ValidatorSet;

use alloy_primitives::{Address, U256};
use keynet_primitives::{ErrorKind, NodeId, StakerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default lifecycle parameters.
pub mod defaults {
    /// Minimum stake for devnet validators
    pub const MINIMUM_STAKE: u64 = 100;

    /// Blocks per epoch
    pub const EPOCH_LENGTH: u64 = 1;

    /// Percent of a kicked validator's stake that is slashed
    pub const KICK_PENALTY_PERCENT: u8 = 10;

    /// First epoch number
    pub const GENESIS_EPOCH: u64 = 1;
}

/// Tunable lifecycle parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingParams {
    /// Stake every validator must keep
    pub minimum_stake: U256,
    /// Epoch length in blocks
    pub epoch_length: u64,
    /// Share of stake slashed on a successful kick
    pub kick_penalty_percent: u8,
    /// Whether kick votes survive an epoch advance
    pub kick_vote_retention: KickVoteRetention,
    /// Reward credited to each validator of a completed epoch
    pub epoch_reward: U256,
    /// Identity allowed to pause and tune parameters
    pub admin: Address,
}

impl Default for StakingParams {
    fn default() -> Self {
        Self {
            minimum_stake: U256::from(defaults::MINIMUM_STAKE),
            epoch_length: defaults::EPOCH_LENGTH,
            kick_penalty_percent: defaults::KICK_PENALTY_PERCENT,
            kick_vote_retention: KickVoteRetention::PerEpoch,
            epoch_reward: U256::ZERO,
            admin: Address::ZERO,
        }
    }
}

/// Staking and epoch errors
#[derive(Debug, Error)]
pub enum StakingError {
    /// Zero amount supplied
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    /// Withdrawal larger than the staked balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount requested
        requested: U256,
        /// Staked balance
        available: U256,
    },

    /// Stake below the validator minimum
    #[error("Stake {balance} is below the minimum stake {minimum}")]
    InsufficientStake {
        /// Resulting balance
        balance: U256,
        /// Required minimum
        minimum: U256,
    },

    /// Node identity already claimed by another staker
    #[error("Node {node} is already registered to staker {staker}")]
    DuplicateNodeIdentity {
        /// Node identity
        node: NodeId,
        /// Staker that owns it
        staker: StakerId,
    },

    /// Node identity not registered to any staker
    #[error("Node {0} is not registered")]
    UnknownNode(NodeId),

    /// Staker has no node metadata registered
    #[error("Staker {0} is not registered")]
    NotRegistered(StakerId),

    /// Identity is not in the current validator set
    #[error("{0} is not a validator in the current epoch")]
    NotCurrentValidator(Address),

    /// Identity is not in the locked next validator set
    #[error("{0} is not a validator in the next epoch")]
    NotInNextSet(StakerId),

    /// Caller is not the admin
    #[error("{0} is not the admin")]
    NotAdmin(Address),

    /// Staker was kicked and cannot rejoin this epoch
    #[error("{0} was kicked and cannot rejoin until the epoch advances")]
    Kicked(StakerId),

    /// Voter already voted to kick this target
    #[error("{voter} already voted to kick {target}")]
    DuplicateKickVote {
        /// Voting staker
        voter: StakerId,
        /// Kick target
        target: StakerId,
    },

    /// Operation not allowed in the current epoch state
    #[error("Cannot {operation} while epoch is {state:?}")]
    WrongState {
        /// Rejected operation
        operation: &'static str,
        /// State at the time of the call
        state: EpochState,
    },

    /// Lifecycle is paused by the admin
    #[error("Epoch lifecycle is paused")]
    Paused,

    /// Ready signal for a different epoch
    #[error("Ready signal for epoch {actual}, current epoch is {expected}")]
    EpochMismatch {
        /// Current epoch number
        expected: u64,
        /// Number in the signal
        actual: u64,
    },

    /// Staker still sits in the current or locked next set
    #[error("{0} is still an active validator")]
    StillValidator(StakerId),

    /// Percent outside 0..=100
    #[error("Invalid percent: {0}")]
    InvalidPercent(u8),

    /// Zero epoch length
    #[error("Epoch length must be greater than zero")]
    InvalidEpochLength,

    /// Collaborator token transfer failed
    #[error("Token transfer failed: {0}")]
    Token(#[from] TokenError),
}

impl StakingError {
    /// Taxonomy category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount | Self::InvalidPercent(_) | Self::InvalidEpochLength => {
                ErrorKind::Value
            }
            Self::InsufficientBalance { .. } | Self::InsufficientStake { .. } | Self::Token(_) => {
                ErrorKind::Economic
            }
            Self::DuplicateNodeIdentity { .. } | Self::DuplicateKickVote { .. } => {
                ErrorKind::Consistency
            }
            Self::UnknownNode(_) |
            Self::NotRegistered(_) |
            Self::NotCurrentValidator(_) |
            Self::NotInNextSet(_) |
            Self::NotAdmin(_) |
            Self::Kicked(_) => ErrorKind::Authorization,
            Self::WrongState { .. } |
            Self::Paused |
            Self::EpochMismatch { .. } |
            Self::StillValidator(_) => ErrorKind::State,
        }
    }
}
