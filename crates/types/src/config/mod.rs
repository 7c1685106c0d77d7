mod env_utils;
pub use env_utils::{
    load_address, load_address_opt, load_parsed, load_string, load_string_opt, load_u64,
    load_u64_opt, load_url, load_url_opt,
};

mod error;
pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use userop_constants::{
    EntryPoint, EntryPointVersion, DEFAULT_RECEIPT_MAX_ATTEMPTS, DEFAULT_RECEIPT_POLL_INTERVAL_MS,
};

/// Bundler RPC endpoint.
pub const BUNDLER_RPC_URL: &str = "BUNDLER_RPC_URL";
/// Chain id.
pub const CHAIN_ID: &str = "CHAIN_ID";
/// Entry point version, `0.6` or `0.7`.
pub const ENTRY_POINT_VERSION: &str = "ENTRY_POINT_VERSION";
/// Entry point address. Defaults to the canonical deployment.
pub const ENTRY_POINT_ADDRESS: &str = "ENTRY_POINT_ADDRESS";
/// Paymaster policy id. Sponsorship is disabled when unset.
pub const PAYMASTER_POLICY_ID: &str = "PAYMASTER_POLICY_ID";
/// Receipt polling interval, in milliseconds.
pub const RECEIPT_POLL_INTERVAL_MS: &str = "RECEIPT_POLL_INTERVAL_MS";
/// Receipt polling attempts.
pub const RECEIPT_MAX_ATTEMPTS: &str = "RECEIPT_MAX_ATTEMPTS";

/// A paymaster gas policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipPolicy {
    /// The policy id sent with every sponsorship request.
    pub policy_id: String,
}

impl SponsorshipPolicy {
    /// Create a new policy.
    pub fn new(policy_id: impl Into<String>) -> Self {
        Self { policy_id: policy_id.into() }
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Bundler RPC endpoint.
    pub bundler_rpc_url: Cow<'static, str>,
    /// Chain id.
    pub chain_id: u64,
    /// The entry point operations are sent through.
    pub entry_point: EntryPoint,
    /// Sponsorship policy, if any.
    pub policy: Option<SponsorshipPolicy>,
    /// Receipt polling interval, in milliseconds.
    pub receipt_poll_interval_ms: u64,
    /// Receipt polling attempts.
    pub receipt_max_attempts: u32,
}

impl ClientConfig {
    /// Load the configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let version: EntryPointVersion = load_parsed(ENTRY_POINT_VERSION)?;
        let entry_point = match load_address_opt(ENTRY_POINT_ADDRESS)? {
            Some(address) => EntryPoint::new(version, address),
            None => EntryPoint::canonical(version),
        };

        let receipt_max_attempts = load_u64_opt(RECEIPT_MAX_ATTEMPTS)?
            .map(|attempts| {
                u32::try_from(attempts).map_err(|_| ConfigError::OutOfRange(RECEIPT_MAX_ATTEMPTS))
            })
            .transpose()?
            .unwrap_or(DEFAULT_RECEIPT_MAX_ATTEMPTS);

        Ok(Self {
            bundler_rpc_url: load_url(BUNDLER_RPC_URL)?,
            chain_id: load_u64(CHAIN_ID)?,
            entry_point,
            policy: load_string_opt(PAYMASTER_POLICY_ID).map(SponsorshipPolicy::new),
            receipt_poll_interval_ms: load_u64_opt(RECEIPT_POLL_INTERVAL_MS)?
                .unwrap_or(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            receipt_max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    // All config env vars are touched by this one test only.
    #[test]
    fn from_env() {
        std::env::set_var(BUNDLER_RPC_URL, "http://localhost:3000");
        std::env::set_var(CHAIN_ID, "31337");
        std::env::set_var(ENTRY_POINT_VERSION, "0.7");
        std::env::remove_var(ENTRY_POINT_ADDRESS);
        std::env::remove_var(PAYMASTER_POLICY_ID);
        std::env::remove_var(RECEIPT_POLL_INTERVAL_MS);
        std::env::set_var(RECEIPT_MAX_ATTEMPTS, "12");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.entry_point, EntryPoint::v07());
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.policy, None);
        assert_eq!(config.receipt_poll_interval_ms, DEFAULT_RECEIPT_POLL_INTERVAL_MS);
        assert_eq!(config.receipt_max_attempts, 12);

        std::env::set_var(ENTRY_POINT_VERSION, "0.6");
        std::env::set_var(ENTRY_POINT_ADDRESS, "0x00000000000000000000000000000000000000e6");
        std::env::set_var(PAYMASTER_POLICY_ID, "policy");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(
            config.entry_point,
            EntryPoint::new(
                EntryPointVersion::V06,
                address!("0x00000000000000000000000000000000000000e6")
            )
        );
        assert_eq!(config.policy, Some(SponsorshipPolicy::new("policy")));

        std::env::set_var(ENTRY_POINT_VERSION, "0.8");
        assert!(matches!(ClientConfig::from_env(), Err(ConfigError::EntryPoint(_))));

        std::env::set_var(ENTRY_POINT_VERSION, "0.7");
        std::env::set_var(RECEIPT_MAX_ATTEMPTS, "4294967296");
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ConfigError::OutOfRange(RECEIPT_MAX_ATTEMPTS))
        ));

        std::env::set_var(RECEIPT_MAX_ATTEMPTS, "12");
        std::env::set_var(CHAIN_ID, "abc");
        assert!(matches!(ClientConfig::from_env(), Err(ConfigError::Parse(_))));
    }
}
