//! KeyNet routing registration
//!
//! Validators vote on the routing data of a key hash. Once the votes of a simple majority
//! of the *current* active validator count have been recorded, the data is committed and
//! never changes again.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod address;
pub mod consensus;
pub mod data;
pub mod view;

pub use address::key_address;
pub use consensus::{RoutingConsensus, RoutingRegistration, VoteOutcome};
pub use data::RoutingData;
pub use view::ValidatorView;

use keynet_primitives::{ErrorKind, KeyHash, NodeId};
use thiserror::Error;

/// Routing vote errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Caller's node is not an active validator
    #[error("Node {0} is not an active validator")]
    Unauthorized(NodeId),

    /// Caller already voted with different data
    #[error("Node {voter} already voted for key {key_hash} with different data")]
    DuplicateVote {
        /// Voting node
        voter: NodeId,
        /// Key hash voted on
        key_hash: KeyHash,
    },

    /// Public key is empty or longer than 65 bytes
    #[error("Invalid public key length: {0}")]
    InvalidKeyLength(usize),

    /// Key hash is not the hash of the submitted public key
    #[error("Key hash {key_hash} does not match public key hash {computed}")]
    KeyHashMismatch {
        /// Key hash voted on
        key_hash: KeyHash,
        /// Hash of the submitted public key
        computed: KeyHash,
    },

    /// No routing data committed for the key
    #[error("Key {0} is not routed")]
    NotRouted(KeyHash),
}

impl RoutingError {
    /// Taxonomy category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::DuplicateVote { .. } | Self::KeyHashMismatch { .. } => ErrorKind::Consistency,
            Self::InvalidKeyLength(_) => ErrorKind::Value,
            Self::NotRouted(_) => ErrorKind::State,
        }
    }
}
