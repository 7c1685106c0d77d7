use userop_constants::ParseEntryPointVersionError;

/// Error type for [`crate::config`] module. Captures errors related to loading
/// configuration from the environment or other sources.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error loading from environment variable
    #[error("missing or non-unicode environment variable: {0}")]
    Var(String),
    /// Error parsing environment variable
    #[error("failed to parse environment variable: {0}")]
    Parse(#[from] std::num::ParseIntError),
    /// Error parsing hex from environment variable
    #[error("failed to parse hex: {0}")]
    Hex(#[from] alloy::hex::FromHexError),
    /// Error parsing the entry point version
    #[error(transparent)]
    EntryPoint(#[from] ParseEntryPointVersionError),
    /// A numeric environment variable does not fit its type
    #[error("environment variable {0} is out of range")]
    OutOfRange(&'static str),
}

impl ConfigError {
    /// Missing or non-unicode env var.
    pub fn missing(s: &str) -> Self {
        ConfigError::Var(s.to_string())
    }
}
