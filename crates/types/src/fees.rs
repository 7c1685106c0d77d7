use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// EIP-1559 fee fields of an operation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeEstimate {
    /// Max fee per gas.
    pub max_fee_per_gas: U256,
    /// Max priority fee per gas.
    pub max_priority_fee_per_gas: U256,
}

impl FeeEstimate {
    /// Create a new fee estimate.
    pub const fn new(max_fee_per_gas: U256, max_priority_fee_per_gas: U256) -> Self {
        Self { max_fee_per_gas, max_priority_fee_per_gas }
    }
}

/// Gas limits returned by `eth_estimateUserOperationGas`.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    /// Gas for the main execution call.
    pub call_gas_limit: U256,
    /// Gas for the validation phase.
    pub verification_gas_limit: U256,
    /// Gas paid to the bundler for unmetered overhead.
    pub pre_verification_gas: U256,
    /// Paymaster validation gas, reported by v0.7 bundlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    /// Paymaster post-op gas, reported by some v0.7 bundlers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
}

impl GasEstimate {
    /// Create a new gas estimate for the account's own gas fields.
    pub const fn new(
        call_gas_limit: U256,
        verification_gas_limit: U256,
        pre_verification_gas: U256,
    ) -> Self {
        Self {
            call_gas_limit,
            verification_gas_limit,
            pre_verification_gas,
            paymaster_verification_gas_limit: None,
            paymaster_post_op_gas_limit: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gas_estimate_from_rpc() {
        let json = r#"{
            "preVerificationGas": "0xb430",
            "verificationGasLimit": "0x13d3e",
            "callGasLimit": "0x2e0e",
            "paymasterVerificationGasLimit": "0x0"
        }"#;
        let estimate: GasEstimate = serde_json::from_str(json).unwrap();
        assert_eq!(estimate.pre_verification_gas, U256::from(0xb430));
        assert_eq!(estimate.paymaster_verification_gas_limit, Some(U256::ZERO));
        assert_eq!(estimate.paymaster_post_op_gas_limit, None);
    }
}
