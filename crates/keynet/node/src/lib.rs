//! KeyNet network node
//!
//! [`Network`] owns every registry: staking and epochs, routing, key ownership and
//! permissions, plus the externally driven block clock. [`NetworkService`] wraps it in a
//! single-writer actor so that every operation is applied atomically and in arrival
//! order; [`NetworkHandle`] is the cloneable client side.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod network;
mod service;

pub use network::Network;
pub use service::{NetworkHandle, NetworkService};

use keynet_config::ConfigError;
use keynet_permissions::PermissionError;
use keynet_primitives::{BlockNumber, ErrorKind};
use keynet_routing::RoutingError;
use keynet_staking::StakingError;
use thiserror::Error;

/// Node errors
#[derive(Debug, Error)]
pub enum NodeError {
    /// Staking or epoch operation failed
    #[error(transparent)]
    Staking(#[from] StakingError),

    /// Routing vote failed
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// Key or permission operation failed
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Block clock moved backwards
    #[error("Block {requested} is behind the current block {current}")]
    BlockRegression {
        /// Current block
        current: BlockNumber,
        /// Requested block
        requested: BlockNumber,
    },

    /// Service loop is no longer running
    #[error("Network service stopped")]
    ServiceStopped,
}

impl NodeError {
    /// Taxonomy category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Staking(err) => err.kind(),
            Self::Routing(err) => err.kind(),
            Self::Permission(err) => err.kind(),
            Self::Config(err) => err.kind(),
            Self::BlockRegression { .. } => ErrorKind::Value,
            Self::ServiceStopped => ErrorKind::State,
        }
    }
}
