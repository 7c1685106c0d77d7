use alloy::primitives::{address, Address};
use std::{fmt, str::FromStr};

/// Canonical deployment of the v0.6 entry point.
pub const ENTRY_POINT_V06_ADDRESS: Address = address!("0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// Canonical deployment of the v0.7 entry point.
pub const ENTRY_POINT_V07_ADDRESS: Address = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");

/// The list of known entry point versions as a string.
const KNOWN_VERSIONS: &str = "0.6, 0.7";

/// Error type for parsing an [`EntryPointVersion`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseEntryPointVersionError {
    /// The version is not supported.
    #[error("entry point version {0} is not supported. supported versions: {KNOWN_VERSIONS}")]
    VersionNotSupported(String),
}

/// Entry point versions understood by the SDK.
///
/// The version fixes the field layout of an operation for its whole
/// lifetime: v0.6 operations carry `initCode` and `paymasterAndData` as
/// opaque blobs, v0.7 operations carry discrete factory and paymaster fields
/// that are packed only for hashing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum EntryPointVersion {
    /// Entry point v0.6.
    #[serde(rename = "0.6")]
    V06,
    /// Entry point v0.7.
    #[serde(rename = "0.7")]
    V07,
}

impl EntryPointVersion {
    /// The canonical deployment address for this version.
    pub const fn canonical_address(&self) -> Address {
        match self {
            Self::V06 => ENTRY_POINT_V06_ADDRESS,
            Self::V07 => ENTRY_POINT_V07_ADDRESS,
        }
    }

    /// The version string, e.g. `0.7`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V06 => "0.6",
            Self::V07 => "0.7",
        }
    }
}

impl fmt::Display for EntryPointVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryPointVersion {
    type Err = ParseEntryPointVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.trim_start_matches('v') {
            "0.6" | "0.6.0" | "06" => Ok(Self::V06),
            "0.7" | "0.7.0" | "07" => Ok(Self::V07),
            _ => Err(ParseEntryPointVersionError::VersionNotSupported(s)),
        }
    }
}

/// An entry point deployment: the version tag and the contract address.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EntryPoint {
    version: EntryPointVersion,
    address: Address,
}

impl EntryPoint {
    /// Create a new entry point.
    pub const fn new(version: EntryPointVersion, address: Address) -> Self {
        Self { version, address }
    }

    /// The canonical v0.6 entry point.
    pub const fn v06() -> Self {
        Self::new(EntryPointVersion::V06, ENTRY_POINT_V06_ADDRESS)
    }

    /// The canonical v0.7 entry point.
    pub const fn v07() -> Self {
        Self::new(EntryPointVersion::V07, ENTRY_POINT_V07_ADDRESS)
    }

    /// The canonical deployment for a version.
    pub const fn canonical(version: EntryPointVersion) -> Self {
        Self::new(version, version.canonical_address())
    }

    /// Get the version.
    pub const fn version(&self) -> EntryPointVersion {
        self.version
    }

    /// Get the contract address.
    pub const fn address(&self) -> Address {
        self.address
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{} @ {}", self.version, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_versions() {
        assert_eq!("0.6".parse::<EntryPointVersion>().unwrap(), EntryPointVersion::V06);
        assert_eq!(" v0.7.0 ".parse::<EntryPointVersion>().unwrap(), EntryPointVersion::V07);
        assert_eq!(
            "0.8".parse::<EntryPointVersion>().unwrap_err(),
            ParseEntryPointVersionError::VersionNotSupported("0.8".to_string())
        );
    }

    #[test]
    fn version_serde_uses_dotted_names() {
        let json = serde_json::to_string(&EntryPointVersion::V07).unwrap();
        assert_eq!(json, "\"0.7\"");
        let back: EntryPointVersion = serde_json::from_str("\"0.6\"").unwrap();
        assert_eq!(back, EntryPointVersion::V06);
    }

    #[test]
    fn canonical_entry_points() {
        assert_eq!(EntryPoint::v06().address(), ENTRY_POINT_V06_ADDRESS);
        assert_eq!(EntryPoint::canonical(EntryPointVersion::V07), EntryPoint::v07());
    }
}
