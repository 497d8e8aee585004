//! KeyNet shared primitives
//!
//! Identity aliases, the error taxonomy every component maps its failures onto, and the
//! majority threshold used both for routing votes and for kick votes.
//!
//! # Error taxonomy
//!
//! ```text
//! Authorization  caller is not the expected identity/validator/owner
//! State          operation invoked in the wrong epoch phase
//! Value          zero amounts, malformed candidate data
//! Economic       stake below minimum, insufficient balance
//! Consistency    pubkey rebinding, conflicting duplicate vote, unrouted key
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod net;

pub use net::{Ipv4Int, ipv4_from_int, ipv4_to_int};

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity that owns stake and controls a validator record.
pub type StakerId = Address;

/// Identity a validator's node process signs and votes with.
pub type NodeId = Address;

/// `keccak256` of a key identity's public key. Doubles as the key identity id.
pub type KeyHash = B256;

/// Externally supplied block height used as the clock.
pub type BlockNumber = u64;

/// Maximum number of scope bits attached to a permitted auth method.
pub const MAX_SCOPE_WIDTH: usize = 256;

/// Category of a rejected operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller is not the expected identity, validator or owner.
    Authorization,
    /// Operation invoked in the wrong phase.
    State,
    /// Malformed or zero-valued input.
    Value,
    /// Stake or balance requirements not met.
    Economic,
    /// Request conflicts with previously recorded state.
    Consistency,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authorization => "authorization",
            Self::State => "state",
            Self::Value => "value",
            Self::Economic => "economic",
            Self::Consistency => "consistency",
        };
        f.write_str(name)
    }
}

/// Votes needed for a simple majority of `count` members: `floor(count / 2) + 1`.
pub const fn majority_threshold(count: usize) -> usize {
    count / 2 + 1
}
