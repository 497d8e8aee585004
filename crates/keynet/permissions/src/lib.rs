//! KeyNet key ownership and permissions
//!
//! Routed keys are minted to a controller. The controller, or the key's own derived
//! address, grants permissions to addresses, actions and generic auth methods. Addresses
//! and actions are stored as auth methods of reserved types, so every grant shares one
//! forward map, one reverse index and one pubkey binding table.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod auth;
pub mod authority;
pub mod keys;
pub mod registry;

pub use auth::{AuthMethod, AuthMethodType, auth_method_id, auth_method_type};
pub use authority::{KeyAuthority, KeyContext};
pub use keys::KeyRegistry;
pub use registry::PermissionRegistry;

use alloy_primitives::{Address, Bytes};
use keynet_primitives::{ErrorKind, KeyHash};
use thiserror::Error;

/// Permission and key ownership errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// Caller neither controls the key nor is its address
    #[error("{caller} is not allowed to manage key {key_hash}")]
    Unauthorized {
        /// Calling identity
        caller: Address,
        /// Key being managed
        key_hash: KeyHash,
    },

    /// Key has no committed routing data
    #[error("Key {0} is not routed")]
    NotRouted(KeyHash),

    /// Auth method is bound to a different pubkey
    #[error("Auth method {method_type}/{user_id:?} is bound to a different pubkey")]
    PubkeyMismatch {
        /// Auth method type
        method_type: AuthMethodType,
        /// User id
        user_id: Bytes,
    },

    /// Auth method not permitted on the key
    #[error("Auth method {method_type}/{user_id:?} is not permitted on key {key_hash}")]
    NotPermitted {
        /// Key
        key_hash: KeyHash,
        /// Auth method type
        method_type: AuthMethodType,
        /// User id
        user_id: Bytes,
    },

    /// Scope index outside the bitmap
    #[error("Scope {scope} is out of range, width is {width}")]
    ScopeOutOfRange {
        /// Requested scope
        scope: usize,
        /// Bitmap width
        width: usize,
    },

    /// Requested prefix wider than the bitmap
    #[error("Scope width {requested} exceeds {max}")]
    InvalidWidth {
        /// Requested width
        requested: usize,
        /// Bitmap width
        max: usize,
    },

    /// Key was minted before
    #[error("Key {0} was already minted")]
    AlreadyMinted(KeyHash),

    /// No minted key with this hash
    #[error("Key {0} does not exist")]
    UnknownKey(KeyHash),

    /// Every routed key of the type is minted
    #[error("No routed key of type {0} is available to mint")]
    NothingToMint(u8),
}

impl PermissionError {
    /// Taxonomy category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized { .. } => ErrorKind::Authorization,
            Self::NotRouted(_) | Self::NotPermitted { .. } | Self::NothingToMint(_) => {
                ErrorKind::State
            }
            Self::PubkeyMismatch { .. } | Self::AlreadyMinted(_) | Self::UnknownKey(_) => {
                ErrorKind::Consistency
            }
            Self::ScopeOutOfRange { .. } | Self::InvalidWidth { .. } => ErrorKind::Value,
        }
    }
}
