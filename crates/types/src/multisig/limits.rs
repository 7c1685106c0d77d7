use super::{AggregationError, GasCommitment};
use crate::{FeeEstimate, UserOperation};
use alloy::primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// The gas values every upper-bound signer agrees not to exceed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpperLimits {
    /// Upper limit on `preVerificationGas`.
    pub pre_verification_gas: U256,
    /// Upper limit on `maxFeePerGas`.
    pub max_fee_per_gas: U256,
    /// Upper limit on `maxPriorityFeePerGas`.
    pub max_priority_fee_per_gas: U256,
}

impl UpperLimits {
    /// Create a new set of limits.
    pub const fn new(
        pre_verification_gas: U256,
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    ) -> Self {
        Self { pre_verification_gas, max_fee_per_gas, max_priority_fee_per_gas }
    }

    /// Take the limits from an operation's current values.
    pub const fn from_operation(op: &UserOperation) -> Self {
        Self::new(op.pre_verification_gas(), op.max_fee_per_gas(), op.max_priority_fee_per_gas())
    }

    /// The fee limits.
    pub const fn fees(&self) -> FeeEstimate {
        FeeEstimate::new(self.max_fee_per_gas, self.max_priority_fee_per_gas)
    }

    /// The operation an upper-bound signer signs: `op` with the three
    /// limited fields replaced by the limits.
    pub fn apply_to(&self, op: UserOperation) -> UserOperation {
        op.with_gas_and_fees(self.pre_verification_gas, self.fees())
    }

    /// The hash a signer with the given commitment signs for `op`.
    pub fn committed_hash(
        &self,
        op: &UserOperation,
        commitment: GasCommitment,
        entry_point: Address,
        chain_id: u64,
    ) -> B256 {
        match commitment {
            GasCommitment::UpperBound => self.apply_to(op.clone()).hash(entry_point, chain_id),
            GasCommitment::Actual => op.hash(entry_point, chain_id),
        }
    }

    /// Lower each value to its limit.
    pub fn cap(&self, pre_verification_gas: U256, fees: FeeEstimate) -> (U256, FeeEstimate) {
        (
            pre_verification_gas.min(self.pre_verification_gas),
            FeeEstimate::new(
                fees.max_fee_per_gas.min(self.max_fee_per_gas),
                fees.max_priority_fee_per_gas.min(self.max_priority_fee_per_gas),
            ),
        )
    }

    /// Check that none of the operation's values exceed the limits.
    pub fn check(&self, op: &UserOperation) -> Result<(), AggregationError> {
        [
            ("preVerificationGas", op.pre_verification_gas(), self.pre_verification_gas),
            ("maxFeePerGas", op.max_fee_per_gas(), self.max_fee_per_gas),
            ("maxPriorityFeePerGas", op.max_priority_fee_per_gas(), self.max_priority_fee_per_gas),
        ]
        .into_iter()
        .find(|(_, actual, limit)| actual > limit)
        .map_or(Ok(()), |(field, actual, limit)| {
            Err(AggregationError::ExceedsLimit { field, actual, limit })
        })
    }

    pub(crate) fn write_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.pre_verification_gas.to_be_bytes::<32>());
        buf.extend_from_slice(&self.max_fee_per_gas.to_be_bytes::<32>());
        buf.extend_from_slice(&self.max_priority_fee_per_gas.to_be_bytes::<32>());
    }

    pub(crate) fn read_from(buf: &[u8]) -> Option<Self> {
        let word = |i: usize| buf.get(i * 32..(i + 1) * 32).map(U256::from_be_slice);
        Some(Self::new(word(0)?, word(1)?, word(2)?))
    }
}
