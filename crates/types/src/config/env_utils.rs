use crate::ConfigError;
use alloy::primitives::Address;
use std::{borrow::Cow, env, str::FromStr};

/// Load a variable from the environment
pub fn load_string(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::missing(key))
}

/// Load a variable from the environment
pub fn load_string_opt(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Load a variable from the environment
pub fn load_u64(key: &str) -> Result<u64, ConfigError> {
    let val = load_string(key)?;
    val.parse::<u64>().map_err(Into::into)
}

/// Load an optional variable from the environment. Present but malformed
/// values are an error.
pub fn load_u64_opt(key: &str) -> Result<Option<u64>, ConfigError> {
    load_string_opt(key).map(|val| val.parse::<u64>()).transpose().map_err(Into::into)
}

/// Load a variable from the environment
pub fn load_url(key: &str) -> Result<Cow<'static, str>, ConfigError> {
    load_string(key).map(Into::into)
}

/// Load a variable from the environment
pub fn load_url_opt(key: &str) -> Option<Cow<'static, str>> {
    load_string_opt(key).map(Into::into)
}

/// Load a variable from the environment
pub fn load_address(key: &str) -> Result<Address, ConfigError> {
    load_string(key)?.parse().map_err(Into::into)
}

/// Load an optional address from the environment.
pub fn load_address_opt(key: &str) -> Result<Option<Address>, ConfigError> {
    load_string_opt(key).map(|val| val.parse::<Address>()).transpose().map_err(Into::into)
}

/// Load and parse a variable from the environment
pub fn load_parsed<T>(key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    ConfigError: From<T::Err>,
{
    load_string(key)?.parse().map_err(Into::into)
}
