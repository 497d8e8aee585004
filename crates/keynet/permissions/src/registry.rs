//! Permission registry
//!
//! Forward map `key → auth method → scope bitmap`, reverse index
//! `auth method → keys`, and the binding table `auth method → pubkey`. Bindings are
//! written once and never removed, so an auth method keeps its pubkey across revoke
//! and re-grant cycles.

use alloy_primitives::{Address, B256, Bytes, U256};
use keynet_primitives::{KeyHash, MAX_SCOPE_WIDTH};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

use crate::{
    AuthMethod, AuthMethodType, KeyAuthority, PermissionError, auth_method_id, auth_method_type,
};

/// Permissions granted on keys
#[derive(Debug, Clone)]
pub struct PermissionRegistry {
    scope_width: usize,
    permitted: HashMap<KeyHash, BTreeMap<B256, U256>>,
    bindings: HashMap<B256, AuthMethod>,
    reverse: HashMap<B256, BTreeSet<KeyHash>>,
}

impl Default for PermissionRegistry {
    fn default() -> Self {
        Self::with_scope_width(MAX_SCOPE_WIDTH)
    }
}

impl PermissionRegistry {
    /// Create a registry with 256-bit scope bitmaps
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry whose scopes are limited to `width` bits, at most 256
    pub fn with_scope_width(width: usize) -> Self {
        Self {
            scope_width: width.min(MAX_SCOPE_WIDTH),
            permitted: HashMap::new(),
            bindings: HashMap::new(),
            reverse: HashMap::new(),
        }
    }

    /// Usable scope bits
    pub const fn scope_width(&self) -> usize {
        self.scope_width
    }

    // --- grants ---

    /// Permit an auth method on a key, binding its pubkey on first use
    pub fn add_permitted_auth_method(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        method: AuthMethod,
        scopes: &[usize],
    ) -> Result<(), PermissionError> {
        self.authorize(authority, caller, key_hash)?;
        let bits = self.scope_bits(scopes)?;

        let id = method.id();
        if let Some(bound) = self.bindings.get(&id) {
            if bound.user_pubkey != method.user_pubkey {
                warn!(
                    target: "keynet::permissions",
                    method_type = method.method_type,
                    user_id = ?method.user_id,
                    "Rejected pubkey rebinding"
                );
                return Err(PermissionError::PubkeyMismatch {
                    method_type: method.method_type,
                    user_id: method.user_id,
                });
            }
        }

        debug!(
            target: "keynet::permissions",
            %key_hash,
            method_type = method.method_type,
            user_id = ?method.user_id,
            scopes = ?scopes,
            "Auth method permitted"
        );
        self.bindings.entry(id).or_insert(method);
        *self.permitted.entry(key_hash).or_default().entry(id).or_default() |= bits;
        self.reverse.entry(id).or_default().insert(key_hash);
        Ok(())
    }

    /// Revoke an auth method; returns whether it was permitted. The pubkey binding stays.
    pub fn remove_permitted_auth_method(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
    ) -> Result<bool, PermissionError> {
        self.authorize(authority, caller, key_hash)?;

        let id = auth_method_id(method_type, user_id);
        let removed = self
            .permitted
            .get_mut(&key_hash)
            .and_then(|methods| methods.remove(&id))
            .is_some();
        self.unindex(id, &key_hash);

        debug!(
            target: "keynet::permissions",
            %key_hash,
            method_type,
            removed,
            "Auth method revoked"
        );
        Ok(removed)
    }

    /// Permit an address
    pub fn add_permitted_address(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        address: Address,
        scopes: &[usize],
    ) -> Result<(), PermissionError> {
        self.add_permitted_auth_method(
            authority,
            caller,
            key_hash,
            AuthMethod::address(address),
            scopes,
        )
    }

    /// Revoke an address
    pub fn remove_permitted_address(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        address: Address,
    ) -> Result<bool, PermissionError> {
        self.remove_permitted_auth_method(
            authority,
            caller,
            key_hash,
            auth_method_type::ADDRESS,
            address.as_slice(),
        )
    }

    /// Permit an action by content hash
    pub fn add_permitted_action(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        content_hash: impl Into<Bytes>,
        scopes: &[usize],
    ) -> Result<(), PermissionError> {
        self.add_permitted_auth_method(
            authority,
            caller,
            key_hash,
            AuthMethod::action(content_hash),
            scopes,
        )
    }

    /// Revoke an action
    pub fn remove_permitted_action(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        content_hash: &[u8],
    ) -> Result<bool, PermissionError> {
        self.remove_permitted_auth_method(
            authority,
            caller,
            key_hash,
            auth_method_type::ACTION,
            content_hash,
        )
    }

    /// Drop every permission on a key. Pubkey bindings stay.
    pub fn clear_key(&mut self, key_hash: &KeyHash) {
        let Some(methods) = self.permitted.remove(key_hash) else { return };
        for id in methods.keys() {
            self.unindex(*id, key_hash);
        }
        debug!(
            target: "keynet::permissions",
            %key_hash,
            cleared = methods.len(),
            "Key permissions cleared"
        );
    }

    // --- scopes ---

    /// Set one scope bit on a permitted auth method
    pub fn add_permitted_auth_method_scope(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        scope: usize,
    ) -> Result<(), PermissionError> {
        self.set_scope(authority, caller, key_hash, method_type, user_id, scope, true)
    }

    /// Clear one scope bit on a permitted auth method
    pub fn remove_permitted_auth_method_scope(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        scope: usize,
    ) -> Result<(), PermissionError> {
        self.set_scope(authority, caller, key_hash, method_type, user_id, scope, false)
    }

    /// Check one scope bit
    pub fn is_permitted_auth_method_scope_present(
        &self,
        key_hash: &KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        scope: usize,
    ) -> Result<bool, PermissionError> {
        self.check_scope(scope)?;
        Ok(self.scopes(key_hash, method_type, user_id).bit(scope))
    }

    /// The first `width` scope bits
    pub fn get_permitted_auth_method_scopes(
        &self,
        key_hash: &KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        width: usize,
    ) -> Result<Vec<bool>, PermissionError> {
        if width > self.scope_width {
            return Err(PermissionError::InvalidWidth { requested: width, max: self.scope_width });
        }
        let bits = self.scopes(key_hash, method_type, user_id);
        Ok((0..width).map(|i| bits.bit(i)).collect())
    }

    // --- views ---

    /// Check if an auth method is permitted on a key
    pub fn is_permitted_auth_method(
        &self,
        key_hash: &KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
    ) -> bool {
        let id = auth_method_id(method_type, user_id);
        self.permitted.get(key_hash).is_some_and(|methods| methods.contains_key(&id))
    }

    /// Check if an address is permitted on a key
    pub fn is_permitted_address(&self, key_hash: &KeyHash, address: &Address) -> bool {
        self.is_permitted_auth_method(key_hash, auth_method_type::ADDRESS, address.as_slice())
    }

    /// Check if an action is permitted on a key
    pub fn is_permitted_action(&self, key_hash: &KeyHash, content_hash: &[u8]) -> bool {
        self.is_permitted_auth_method(key_hash, auth_method_type::ACTION, content_hash)
    }

    /// Every auth method permitted on a key, addresses and actions included
    pub fn get_permitted_auth_methods(&self, key_hash: &KeyHash) -> Vec<AuthMethod> {
        self.permitted_methods(key_hash).cloned().collect()
    }

    /// Addresses permitted on a key
    pub fn get_permitted_addresses(&self, key_hash: &KeyHash) -> Vec<Address> {
        self.permitted_methods(key_hash).filter_map(AuthMethod::as_address).collect()
    }

    /// Actions permitted on a key
    pub fn get_permitted_actions(&self, key_hash: &KeyHash) -> Vec<Bytes> {
        self.permitted_methods(key_hash)
            .filter(|method| method.method_type == auth_method_type::ACTION)
            .map(|method| method.user_id.clone())
            .collect()
    }

    /// Keys permitting an auth method
    pub fn get_key_hashes_for_auth_method(
        &self,
        method_type: AuthMethodType,
        user_id: &[u8],
    ) -> Vec<KeyHash> {
        self.reverse
            .get(&auth_method_id(method_type, user_id))
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Pubkey bound to an auth method
    pub fn get_user_pubkey_for_auth_method(
        &self,
        method_type: AuthMethodType,
        user_id: &[u8],
    ) -> Option<&Bytes> {
        self.bindings.get(&auth_method_id(method_type, user_id)).map(|m| &m.user_pubkey)
    }

    // --- helpers ---

    fn authorize(
        &self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
    ) -> Result<(), PermissionError> {
        if !authority.is_routed(&key_hash) {
            return Err(PermissionError::NotRouted(key_hash));
        }
        let allowed = authority.controller(&key_hash) == Some(caller) ||
            authority.key_address(&key_hash) == Some(caller);
        if !allowed {
            return Err(PermissionError::Unauthorized { caller, key_hash });
        }
        Ok(())
    }

    const fn check_scope(&self, scope: usize) -> Result<(), PermissionError> {
        if scope >= self.scope_width {
            return Err(PermissionError::ScopeOutOfRange { scope, width: self.scope_width });
        }
        Ok(())
    }

    fn scope_bits(&self, scopes: &[usize]) -> Result<U256, PermissionError> {
        let mut bits = U256::ZERO;
        for &scope in scopes {
            self.check_scope(scope)?;
            bits.set_bit(scope, true);
        }
        Ok(bits)
    }

    fn scopes(&self, key_hash: &KeyHash, method_type: AuthMethodType, user_id: &[u8]) -> U256 {
        let id = auth_method_id(method_type, user_id);
        self.permitted
            .get(key_hash)
            .and_then(|methods| methods.get(&id))
            .copied()
            .unwrap_or_default()
    }

    #[allow(clippy::too_many_arguments)]
    fn set_scope(
        &mut self,
        authority: &impl KeyAuthority,
        caller: Address,
        key_hash: KeyHash,
        method_type: AuthMethodType,
        user_id: &[u8],
        scope: usize,
        value: bool,
    ) -> Result<(), PermissionError> {
        self.authorize(authority, caller, key_hash)?;
        self.check_scope(scope)?;

        let id = auth_method_id(method_type, user_id);
        let bits = self
            .permitted
            .get_mut(&key_hash)
            .and_then(|methods| methods.get_mut(&id))
            .ok_or_else(|| PermissionError::NotPermitted {
                key_hash,
                method_type,
                user_id: Bytes::copy_from_slice(user_id),
            })?;
        bits.set_bit(scope, value);
        debug!(
            target: "keynet::permissions",
            %key_hash,
            method_type,
            scope,
            value,
            "Scope updated"
        );
        Ok(())
    }

    fn permitted_methods(&self, key_hash: &KeyHash) -> impl Iterator<Item = &AuthMethod> + '_ {
        self.permitted
            .get(key_hash)
            .into_iter()
            .flat_map(|methods| methods.keys())
            .filter_map(|id| self.bindings.get(id))
    }

    fn unindex(&mut self, id: B256, key_hash: &KeyHash) {
        if let Some(keys) = self.reverse.get_mut(&id) {
            keys.remove(key_hash);
            if keys.is_empty() {
                self.reverse.remove(&id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    const OWNER: Address = Address::repeat_byte(0xaa);
    const KEY_ADDRESS: Address = Address::repeat_byte(0xee);
    const KEY: KeyHash = KeyHash::repeat_byte(0x11);

    /// One routed key with a fixed owner and address
    struct OneKey;

    impl KeyAuthority for OneKey {
        fn is_routed(&self, key_hash: &KeyHash) -> bool {
            *key_hash == KEY
        }

        fn controller(&self, key_hash: &KeyHash) -> Option<Address> {
            (*key_hash == KEY).then_some(OWNER)
        }

        fn key_address(&self, key_hash: &KeyHash) -> Option<Address> {
            (*key_hash == KEY).then_some(KEY_ADDRESS)
        }
    }

    const USER_ID: [u8; 6] = [0xde, 0xad, 0xbe, 0xef, 0x12, 0x34];

    #[test]
    fn test_address_grant_and_revoke() {
        let mut registry = PermissionRegistry::new();
        let address = Address::repeat_byte(0x75);
        assert!(!registry.is_permitted_address(&KEY, &address));

        registry.add_permitted_address(&OneKey, OWNER, KEY, address, &[]).unwrap();
        assert!(registry.is_permitted_address(&KEY, &address));
        assert_eq!(registry.get_permitted_addresses(&KEY), vec![address]);

        assert!(registry.remove_permitted_address(&OneKey, OWNER, KEY, address).unwrap());
        assert!(!registry.is_permitted_address(&KEY, &address));
        assert!(registry.get_permitted_addresses(&KEY).is_empty());
    }

    #[test]
    fn test_action_grant_and_revoke() {
        let mut registry = PermissionRegistry::new();
        let action = vec![0x12, 0x20, 0xab];

        registry.add_permitted_action(&OneKey, OWNER, KEY, action.clone(), &[]).unwrap();
        assert!(registry.is_permitted_action(&KEY, &action));
        assert_eq!(registry.get_permitted_actions(&KEY), vec![Bytes::from(action.clone())]);

        registry.remove_permitted_action(&OneKey, OWNER, KEY, &action).unwrap();
        assert!(!registry.is_permitted_action(&KEY, &action));

        // re-grant works since actions bind the empty pubkey
        registry.add_permitted_action(&OneKey, OWNER, KEY, action.clone(), &[]).unwrap();
        assert!(registry.is_permitted_action(&KEY, &action));
    }

    #[test]
    fn test_pubkey_binding_survives_revoke() {
        let mut registry = PermissionRegistry::new();
        let method = AuthMethod::new(5, USER_ID.to_vec(), vec![0x98, 0x76, 0x54, 0x32, 0x10]);

        registry.add_permitted_auth_method(&OneKey, OWNER, KEY, method.clone(), &[]).unwrap();
        assert_eq!(
            registry.get_user_pubkey_for_auth_method(5, &USER_ID),
            Some(&method.user_pubkey)
        );
        assert_eq!(registry.get_key_hashes_for_auth_method(5, &USER_ID), vec![KEY]);

        let rebind = AuthMethod::new(5, USER_ID.to_vec(), vec![0x55]);
        assert_matches!(
            registry.add_permitted_auth_method(&OneKey, OWNER, KEY, rebind, &[]),
            Err(PermissionError::PubkeyMismatch { method_type: 5, .. })
        );

        registry.remove_permitted_auth_method(&OneKey, OWNER, KEY, 5, &USER_ID).unwrap();
        assert!(!registry.is_permitted_auth_method(&KEY, 5, &USER_ID));
        assert!(registry.get_key_hashes_for_auth_method(5, &USER_ID).is_empty());

        let rebind = AuthMethod::new(5, USER_ID.to_vec(), vec![0x66]);
        assert_matches!(
            registry.add_permitted_auth_method(&OneKey, OWNER, KEY, rebind, &[]),
            Err(PermissionError::PubkeyMismatch { .. })
        );
        assert_eq!(
            registry.get_user_pubkey_for_auth_method(5, &USER_ID),
            Some(&method.user_pubkey)
        );
        assert!(!registry.is_permitted_auth_method(&KEY, 5, &USER_ID));
    }

    #[test]
    fn test_scopes() {
        let mut registry = PermissionRegistry::new();
        let method = AuthMethod::new(5, USER_ID.to_vec(), vec![0x98]);

        let scopes = registry.get_permitted_auth_method_scopes(&KEY, 5, &USER_ID, 256).unwrap();
        assert_eq!(scopes.len(), 256);
        assert!(scopes.iter().all(|present| !present));

        registry.add_permitted_auth_method(&OneKey, OWNER, KEY, method, &[10, 20]).unwrap();
        let scopes = registry.get_permitted_auth_method_scopes(&KEY, 5, &USER_ID, 256).unwrap();
        assert!(scopes[10] && scopes[20]);
        assert_eq!(scopes.iter().filter(|present| **present).count(), 2);

        registry.remove_permitted_auth_method_scope(&OneKey, OWNER, KEY, 5, &USER_ID, 20).unwrap();
        assert!(!registry.is_permitted_auth_method_scope_present(&KEY, 5, &USER_ID, 20).unwrap());

        registry.add_permitted_auth_method_scope(&OneKey, OWNER, KEY, 5, &USER_ID, 40).unwrap();
        assert!(registry.is_permitted_auth_method_scope_present(&KEY, 5, &USER_ID, 40).unwrap());
        assert!(registry.is_permitted_auth_method_scope_present(&KEY, 5, &USER_ID, 255).is_ok());

        assert_matches!(
            registry.is_permitted_auth_method_scope_present(&KEY, 5, &USER_ID, 256),
            Err(PermissionError::ScopeOutOfRange { scope: 256, .. })
        );
        assert_matches!(
            registry.get_permitted_auth_method_scopes(&KEY, 5, &USER_ID, 257),
            Err(PermissionError::InvalidWidth { requested: 257, .. })
        );
        let scopes = registry.get_permitted_auth_method_scopes(&KEY, 5, &USER_ID, 16).unwrap();
        assert_eq!(scopes.len(), 16);
    }

    #[test]
    fn test_scope_requires_permitted_method() {
        let mut registry = PermissionRegistry::new();
        assert_matches!(
            registry.add_permitted_auth_method_scope(&OneKey, OWNER, KEY, 5, &USER_ID, 1),
            Err(PermissionError::NotPermitted { .. })
        );
    }

    #[test]
    fn test_narrow_scope_width() {
        let mut registry = PermissionRegistry::with_scope_width(8);
        let method = AuthMethod::new(5, USER_ID.to_vec(), Bytes::new());
        assert_matches!(
            registry.add_permitted_auth_method(&OneKey, OWNER, KEY, method, &[8]),
            Err(PermissionError::ScopeOutOfRange { scope: 8, width: 8 })
        );
        assert!(!registry.is_permitted_auth_method(&KEY, 5, &USER_ID));
    }

    #[test]
    fn test_authorization() {
        let mut registry = PermissionRegistry::new();
        let address = Address::repeat_byte(0x75);

        assert_matches!(
            registry.add_permitted_address(&OneKey, Address::repeat_byte(0x01), KEY, address, &[]),
            Err(PermissionError::Unauthorized { .. })
        );
        assert_matches!(
            registry.add_permitted_address(&OneKey, OWNER, KeyHash::ZERO, address, &[]),
            Err(PermissionError::NotRouted(_))
        );

        // the key's own address may manage it
        registry.add_permitted_address(&OneKey, KEY_ADDRESS, KEY, address, &[]).unwrap();
        assert!(registry.is_permitted_address(&KEY, &address));
    }

    #[test]
    fn test_clear_key_keeps_bindings() {
        let mut registry = PermissionRegistry::new();
        let method = AuthMethod::new(5, USER_ID.to_vec(), vec![0x98]);
        registry.add_permitted_auth_method(&OneKey, OWNER, KEY, method.clone(), &[1]).unwrap();
        let permitted = Address::repeat_byte(0x75);
        registry.add_permitted_address(&OneKey, OWNER, KEY, permitted, &[]).unwrap();

        registry.clear_key(&KEY);
        assert!(registry.get_permitted_auth_methods(&KEY).is_empty());
        assert!(registry.get_key_hashes_for_auth_method(5, &USER_ID).is_empty());
        assert_eq!(
            registry.get_user_pubkey_for_auth_method(5, &USER_ID),
            Some(&method.user_pubkey)
        );
    }

    proptest! {
        #[test]
        fn prop_binding_is_permanent(
            ops in prop::collection::vec((any::<bool>(), 0u8..4), 1..30),
        ) {
            let mut registry = PermissionRegistry::new();
            let mut bound: Option<Bytes> = None;

            for (add, pubkey) in ops {
                if add {
                    let method = AuthMethod::new(7, USER_ID.to_vec(), vec![pubkey]);
                    let result =
                        registry.add_permitted_auth_method(&OneKey, OWNER, KEY, method, &[]);
                    match &bound {
                        Some(existing) if existing.as_ref() != [pubkey] => {
                            prop_assert!(result.is_err());
                        }
                        _ => {
                            prop_assert!(result.is_ok());
                            bound.get_or_insert_with(|| Bytes::from(vec![pubkey]));
                        }
                    }
                } else {
                    registry
                        .remove_permitted_auth_method(&OneKey, OWNER, KEY, 7, &USER_ID)
                        .unwrap();
                }
                prop_assert_eq!(
                    registry.get_user_pubkey_for_auth_method(7, &USER_ID),
                    bound.as_ref()
                );
            }
        }
    }
}
