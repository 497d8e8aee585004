//! Who may manage a key

use alloy_primitives::Address;
use keynet_primitives::KeyHash;
use keynet_routing::RoutingConsensus;

use crate::KeyRegistry;

/// Routing and ownership facts the permission registry authorizes against
pub trait KeyAuthority {
    /// Check if the key's routing data is committed
    fn is_routed(&self, key_hash: &KeyHash) -> bool;

    /// Current controller of the key, if minted
    fn controller(&self, key_hash: &KeyHash) -> Option<Address>;

    /// Address derived from the key's public key
    fn key_address(&self, key_hash: &KeyHash) -> Option<Address>;
}

/// [`KeyAuthority`] backed by the routing and key registries
#[derive(Debug, Clone, Copy)]
pub struct KeyContext<'a> {
    /// Routing registrations
    pub routing: &'a RoutingConsensus,
    /// Minted keys
    pub keys: &'a KeyRegistry,
}

impl<'a> KeyContext<'a> {
    /// Create a context
    pub const fn new(routing: &'a RoutingConsensus, keys: &'a KeyRegistry) -> Self {
        Self { routing, keys }
    }
}

impl KeyAuthority for KeyContext<'_> {
    fn is_routed(&self, key_hash: &KeyHash) -> bool {
        self.routing.is_routed(key_hash)
    }

    fn controller(&self, key_hash: &KeyHash) -> Option<Address> {
        self.keys.owner_of(key_hash)
    }

    fn key_address(&self, key_hash: &KeyHash) -> Option<Address> {
        self.routing.key_address(key_hash)
    }
}
