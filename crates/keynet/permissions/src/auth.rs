//! Auth methods

use alloy_primitives::{Address, B256, Bytes, keccak256};
use serde::{Deserialize, Serialize};

/// Numeric auth method type
pub type AuthMethodType = u64;

/// Reserved auth method types
pub mod auth_method_type {
    use super::AuthMethodType;

    /// Ethereum-style address; the user id is the 20 address bytes
    pub const ADDRESS: AuthMethodType = 1;

    /// Action identified by its content hash
    pub const ACTION: AuthMethodType = 2;
}

/// An auth method together with the pubkey bound to it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuthMethod {
    /// Auth method type
    pub method_type: AuthMethodType,
    /// User id within the type
    pub user_id: Bytes,
    /// Pubkey bound to `(method_type, user_id)`
    pub user_pubkey: Bytes,
}

impl AuthMethod {
    /// Create an auth method
    pub fn new(
        method_type: AuthMethodType,
        user_id: impl Into<Bytes>,
        user_pubkey: impl Into<Bytes>,
    ) -> Self {
        Self { method_type, user_id: user_id.into(), user_pubkey: user_pubkey.into() }
    }

    /// Auth method for an address
    pub fn address(address: Address) -> Self {
        Self::new(auth_method_type::ADDRESS, address.to_vec(), Bytes::new())
    }

    /// Auth method for an action
    pub fn action(content_hash: impl Into<Bytes>) -> Self {
        Self::new(auth_method_type::ACTION, content_hash, Bytes::new())
    }

    /// Identifier of `(method_type, user_id)`
    pub fn id(&self) -> B256 {
        auth_method_id(self.method_type, &self.user_id)
    }

    /// The address, for an address auth method
    pub fn as_address(&self) -> Option<Address> {
        (self.method_type == auth_method_type::ADDRESS)
            .then(|| Address::try_from(self.user_id.as_ref()).ok())
            .flatten()
    }
}

/// Identifier of an auth method: `keccak256(type_be_bytes ++ user_id)`
pub fn auth_method_id(method_type: AuthMethodType, user_id: &[u8]) -> B256 {
    let mut buf = Vec::with_capacity(8 + user_id.len());
    buf.extend_from_slice(&method_type.to_be_bytes());
    buf.extend_from_slice(user_id);
    keccak256(&buf)
}
