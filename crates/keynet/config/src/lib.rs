//! KeyNet network configuration
//!
//! A [`NetworkConfig`] carries every tunable of a network: stake requirements, epoch
//! timing, kick penalties and the permission scope width. Presets exist per
//! [`NetworkType`]; configs round-trip through JSON files.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod config;

pub use config::{NetworkConfig, NetworkType, presets};

use keynet_primitives::ErrorKind;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Kick penalty above 100 percent
    #[error("Kick penalty must be at most 100 percent, got {0}")]
    InvalidPercent(u8),

    /// Zero epoch length
    #[error("Epoch length must be greater than zero")]
    ZeroEpochLength,

    /// Zero minimum stake
    #[error("Minimum stake must be greater than zero")]
    ZeroMinimumStake,

    /// Scope width outside 1..=256
    #[error("Scope width must be within 1..=256, got {0}")]
    InvalidScopeWidth(usize),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    /// Taxonomy category of this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_) => ErrorKind::State,
            _ => ErrorKind::Value,
        }
    }
}
