use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use userop_constants::EntryPointVersion;

/// Discrete paymaster fields of a v0.7 operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterData {
    /// The paymaster contract.
    pub paymaster: Address,
    /// Paymaster-specific data, usually a signature over the operation.
    pub paymaster_data: Bytes,
    /// Gas for the paymaster's validation.
    pub paymaster_verification_gas_limit: U256,
    /// Gas for the paymaster's post-op call.
    pub paymaster_post_op_gas_limit: U256,
}

impl PaymasterData {
    /// Pack into the `paymasterAndData` form hashed by the entry point:
    /// `paymaster ‖ verificationGas (16 bytes) ‖ postOpGas (16 bytes) ‖ data`.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(52 + self.paymaster_data.len());
        buf.extend_from_slice(self.paymaster.as_slice());
        buf.extend_from_slice(&self.paymaster_verification_gas_limit.to_be_bytes::<32>()[16..]);
        buf.extend_from_slice(&self.paymaster_post_op_gas_limit.to_be_bytes::<32>()[16..]);
        buf.extend_from_slice(&self.paymaster_data);
        buf.into()
    }
}

/// Sponsorship attached to an operation, shaped by entry point version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sponsorship {
    /// v0.6 `paymasterAndData`. Empty when self-sponsored.
    V06 {
        /// Paymaster address followed by paymaster data.
        paymaster_and_data: Bytes,
    },
    /// v0.7 paymaster fields. `None` when self-sponsored.
    V07(Option<PaymasterData>),
}

impl Sponsorship {
    /// Zero-valued sponsorship: the account pays for itself.
    pub const fn none(version: EntryPointVersion) -> Self {
        match version {
            EntryPointVersion::V06 => Self::V06 { paymaster_and_data: Bytes::new() },
            EntryPointVersion::V07 => Self::V07(None),
        }
    }

    /// The entry point version this sponsorship is shaped for.
    pub const fn version(&self) -> EntryPointVersion {
        match self {
            Self::V06 { .. } => EntryPointVersion::V06,
            Self::V07(_) => EntryPointVersion::V07,
        }
    }

    /// True if a paymaster pays for the operation.
    pub fn is_sponsored(&self) -> bool {
        match self {
            Self::V06 { paymaster_and_data } => !paymaster_and_data.is_empty(),
            Self::V07(data) => data.is_some(),
        }
    }

    /// The paymaster address, if sponsored.
    pub fn paymaster(&self) -> Option<Address> {
        match self {
            Self::V06 { paymaster_and_data } => {
                paymaster_and_data.get(..20).map(Address::from_slice)
            }
            Self::V07(data) => data.as_ref().map(|d| d.paymaster),
        }
    }

    /// The packed `paymasterAndData` blob.
    pub fn paymaster_and_data(&self) -> Bytes {
        match self {
            Self::V06 { paymaster_and_data } => paymaster_and_data.clone(),
            Self::V07(data) => data.as_ref().map(PaymasterData::to_bytes).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_unsponsored() {
        for version in [EntryPointVersion::V06, EntryPointVersion::V07] {
            let none = Sponsorship::none(version);
            assert_eq!(none.version(), version);
            assert!(!none.is_sponsored());
            assert!(none.paymaster().is_none());
            assert!(none.paymaster_and_data().is_empty());
        }
    }

    #[test]
    fn v06_paymaster_prefix() {
        let paymaster = Address::repeat_byte(0x9a);
        let mut blob = paymaster.to_vec();
        blob.extend_from_slice(&[1, 2, 3]);
        let sponsorship = Sponsorship::V06 { paymaster_and_data: blob.into() };
        assert!(sponsorship.is_sponsored());
        assert_eq!(sponsorship.paymaster(), Some(paymaster));
    }
}
