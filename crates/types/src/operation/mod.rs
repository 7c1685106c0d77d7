mod pending;
pub use pending::{Call, InitCode, PendingOperation};

mod sponsorship;
pub use sponsorship::{PaymasterData, Sponsorship};

mod v06;
pub use v06::UserOperationV06;

mod v07;
pub use v07::UserOperationV07;

use crate::{FeeEstimate, OperationFingerprint};
use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use userop_constants::EntryPointVersion;

/// Errors produced while assembling an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OperationError {
    /// A numeric field was never filled in.
    #[error("operation field {0} has not been resolved")]
    Unresolved(&'static str),
    /// Data shaped for one entry point version was attached to an operation
    /// of another.
    #[error("entry point version mismatch: operation is v{expected}, data is v{actual}")]
    VersionMismatch {
        /// The operation's version.
        expected: EntryPointVersion,
        /// The version of the offending data.
        actual: EntryPointVersion,
    },
    /// A v0.7 field packed into 16 bytes holds a larger value.
    #[error("operation field {field} value {value} does not fit in 128 bits")]
    Oversized {
        /// The field name.
        field: &'static str,
        /// The value.
        value: U256,
    },
}

/// A fully resolved user operation, tagged by entry point version.
///
/// Serializes to the JSON-RPC form expected by bundlers. Deserialization
/// picks the variant from the fields present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserOperation {
    /// A v0.6 operation.
    V06(UserOperationV06),
    /// A v0.7 operation.
    V07(UserOperationV07),
}

macro_rules! field {
    ($self:ident.$field:ident) => {
        match $self {
            UserOperation::V06(op) => &op.$field,
            UserOperation::V07(op) => &op.$field,
        }
    };
}

impl UserOperation {
    /// The entry point version.
    pub const fn version(&self) -> EntryPointVersion {
        match self {
            Self::V06(_) => EntryPointVersion::V06,
            Self::V07(_) => EntryPointVersion::V07,
        }
    }

    /// The account sending the operation.
    pub const fn sender(&self) -> Address {
        *field!(self.sender)
    }

    /// The nonce.
    pub const fn nonce(&self) -> U256 {
        *field!(self.nonce)
    }

    /// The calldata.
    pub const fn call_data(&self) -> &Bytes {
        field!(self.call_data)
    }

    /// Deployment data, if any.
    pub fn init_code(&self) -> Option<InitCode> {
        match self {
            Self::V06(op) => op.init_code(),
            Self::V07(op) => op.init_code(),
        }
    }

    /// Gas for the main execution call.
    pub const fn call_gas_limit(&self) -> U256 {
        *field!(self.call_gas_limit)
    }

    /// Gas for the validation phase.
    pub const fn verification_gas_limit(&self) -> U256 {
        *field!(self.verification_gas_limit)
    }

    /// Gas paid to the bundler for unmetered overhead.
    pub const fn pre_verification_gas(&self) -> U256 {
        *field!(self.pre_verification_gas)
    }

    /// EIP-1559 max fee.
    pub const fn max_fee_per_gas(&self) -> U256 {
        *field!(self.max_fee_per_gas)
    }

    /// EIP-1559 priority fee.
    pub const fn max_priority_fee_per_gas(&self) -> U256 {
        *field!(self.max_priority_fee_per_gas)
    }

    /// Both fee fields.
    pub const fn fees(&self) -> FeeEstimate {
        FeeEstimate {
            max_fee_per_gas: self.max_fee_per_gas(),
            max_priority_fee_per_gas: self.max_priority_fee_per_gas(),
        }
    }

    /// The sponsorship carried by the operation.
    pub fn sponsorship(&self) -> Sponsorship {
        match self {
            Self::V06(op) => Sponsorship::V06 { paymaster_and_data: op.paymaster_and_data.clone() },
            Self::V07(op) => Sponsorship::V07(op.paymaster_fields()),
        }
    }

    /// The account signature.
    pub const fn signature(&self) -> &Bytes {
        field!(self.signature)
    }

    /// Replace the signature.
    pub fn set_signature(&mut self, signature: Bytes) {
        match self {
            Self::V06(op) => op.signature = signature,
            Self::V07(op) => op.signature = signature,
        }
    }

    /// Replace the signature, by value.
    pub fn with_signature(mut self, signature: Bytes) -> Self {
        self.set_signature(signature);
        self
    }

    /// Replace `preVerificationGas` and both fee fields. Used to compute the
    /// hash a signer commits to when signing against upper limits.
    pub fn with_gas_and_fees(mut self, pre_verification_gas: U256, fees: FeeEstimate) -> Self {
        match &mut self {
            Self::V06(op) => {
                op.pre_verification_gas = pre_verification_gas;
                op.max_fee_per_gas = fees.max_fee_per_gas;
                op.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;
            }
            Self::V07(op) => {
                op.pre_verification_gas = pre_verification_gas;
                op.max_fee_per_gas = fees.max_fee_per_gas;
                op.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;
            }
        }
        self
    }

    /// The cache key for this operation.
    pub fn fingerprint(&self) -> OperationFingerprint {
        OperationFingerprint::new(self.sender(), self.nonce(), self.call_data())
    }

    /// The operation hash the account signs, as computed by the entry point.
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        match self {
            Self::V06(op) => op.hash(entry_point, chain_id),
            Self::V07(op) => op.hash(entry_point, chain_id),
        }
    }
}

impl From<UserOperationV06> for UserOperation {
    fn from(value: UserOperationV06) -> Self {
        Self::V06(value)
    }
}

impl From<UserOperationV07> for UserOperation {
    fn from(value: UserOperationV07) -> Self {
        Self::V07(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GasEstimate;

    fn resolved(version: EntryPointVersion) -> UserOperation {
        let mut op =
            PendingOperation::new(version, Address::repeat_byte(2), U256::from(1), Bytes::new());
        op.set_gas(&GasEstimate::new(U256::from(1), U256::from(2), U256::from(3)));
        op.set_fees(FeeEstimate::new(U256::from(20), U256::from(2)));
        op.resolve().unwrap()
    }

    #[test]
    fn untagged_deserialization_picks_the_right_variant() {
        for version in [EntryPointVersion::V06, EntryPointVersion::V07] {
            let op = resolved(version);
            let json = serde_json::to_string(&op).unwrap();
            let back: UserOperation = serde_json::from_str(&json).unwrap();
            assert_eq!(back.version(), version);
            assert_eq!(back, op);
        }
    }

    #[test]
    fn with_gas_and_fees_changes_the_hash() {
        let op = resolved(EntryPointVersion::V07);
        let limited = op
            .clone()
            .with_gas_and_fees(U256::from(30), FeeEstimate::new(U256::from(40), U256::from(4)));
        assert_eq!(limited.pre_verification_gas(), U256::from(30));
        assert_eq!(limited.call_gas_limit(), op.call_gas_limit());
        assert_ne!(limited.hash(Address::ZERO, 1), op.hash(Address::ZERO, 1));
    }
}
