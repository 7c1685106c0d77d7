use alloy::transports::TransportError;
use userop_constants::EntryPointVersion;

/// Result type for [`BundlerClient`] operations.
///
/// [`BundlerClient`]: crate::BundlerClient
pub type Result<T> = std::result::Result<T, BundlerError>;

/// Errors returned by the [`BundlerClient`].
///
/// [`BundlerClient`]: crate::BundlerClient
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum BundlerError {
    /// The latest block has no base fee.
    #[error("latest block has no base fee")]
    MissingBaseFee,

    /// The paymaster response carried no paymaster data for the operation's
    /// entry point version.
    #[error("sponsorship response has no paymaster data for entry point v{0}")]
    MissingPaymaster(EntryPointVersion),

    /// An error occurred while parsing the URL.
    #[error(transparent)]
    Url(#[from] url::ParseError),

    /// An error occurred while contacting the bundler.
    #[error("error contacting bundler: {0}")]
    Transport(#[from] TransportError),
}
