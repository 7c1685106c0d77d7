//! Wire types for bundler and paymaster RPC methods.
use crate::{BundlerError, Result};
use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use userop_constants::{
    EntryPointVersion, DEFAULT_PAYMASTER_POST_OP_GAS_LIMIT,
    DEFAULT_PAYMASTER_VERIFICATION_GAS_LIMIT,
};
use userop_types::{
    FeeEstimate, FeeOption, FeeOptions, FieldOverride, GasEstimate, OperationOverrides,
    PaymasterData, Sponsorship, UserOperation,
};

/// Gas and fee overrides forwarded to the paymaster, so its estimates honor
/// the caller's choices.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasOverrides {
    /// `callGasLimit` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<FieldOverride>,
    /// `verificationGasLimit` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<FieldOverride>,
    /// `preVerificationGas` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<FieldOverride>,
    /// `maxFeePerGas` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<FieldOverride>,
    /// `maxPriorityFeePerGas` override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<FieldOverride>,
}

impl GasOverrides {
    /// Collect what the paymaster must honor for each field: the caller's
    /// override, else the fee option's multiplier. `None` if nothing applies.
    pub fn from_overrides(overrides: &OperationOverrides, options: &FeeOptions) -> Option<Self> {
        let pick = |field: Option<FieldOverride>, option: Option<FeeOption>| {
            field.or_else(|| option?.multiplier.map(FieldOverride::multiplier))
        };
        let this = Self {
            call_gas_limit: pick(overrides.call_gas_limit, options.call_gas_limit),
            verification_gas_limit: pick(
                overrides.verification_gas_limit,
                options.verification_gas_limit,
            ),
            pre_verification_gas: pick(
                overrides.pre_verification_gas,
                options.pre_verification_gas,
            ),
            max_fee_per_gas: pick(overrides.max_fee_per_gas, options.max_fee_per_gas),
            max_priority_fee_per_gas: pick(
                overrides.max_priority_fee_per_gas,
                options.max_priority_fee_per_gas,
            ),
        };
        (this != Self::default()).then_some(this)
    }
}

/// Parameters of `alchemy_requestGasAndPaymasterAndData`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsorshipRequest {
    /// The gas policy to charge.
    pub policy_id: String,
    /// The entry point address.
    pub entry_point: Address,
    /// The operation, with placeholder values for unresolved fields.
    pub user_operation: UserOperation,
    /// A signature of the same length as the final one.
    pub dummy_signature: Bytes,
    /// Caller overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overrides: Option<GasOverrides>,
}

impl SponsorshipRequest {
    /// The entry point version of the operation.
    pub const fn version(&self) -> EntryPointVersion {
        self.user_operation.version()
    }
}

/// A paymaster's answer, reshaped for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SponsorshipResponse {
    /// Gas limits estimated by the paymaster, if it returned all three.
    pub gas: Option<GasEstimate>,
    /// Fees chosen by the paymaster, if it returned both.
    pub fees: Option<FeeEstimate>,
    /// The sponsorship data.
    pub sponsorship: Sponsorship,
}

/// Result of `alchemy_requestGasAndPaymasterAndData`, as sent on the wire.
/// Which fields are present depends on the entry point version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSponsorshipResponse {
    /// v0.6 paymaster blob.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_and_data: Option<Bytes>,
    /// v0.7 paymaster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// v0.7 paymaster data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    /// v0.7 paymaster validation gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    /// v0.7 paymaster post-op gas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    /// Estimated `callGasLimit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<U256>,
    /// Estimated `verificationGasLimit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<U256>,
    /// Estimated `preVerificationGas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<U256>,
    /// Chosen `maxFeePerGas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<U256>,
    /// Chosen `maxPriorityFeePerGas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<U256>,
}

impl RawSponsorshipResponse {
    /// Reshape for an operation of the given version. Missing v0.7 paymaster
    /// gas limits fall back to defaults.
    pub fn into_response(self, version: EntryPointVersion) -> Result<SponsorshipResponse> {
        let sponsorship = match version {
            EntryPointVersion::V06 => Sponsorship::V06 {
                paymaster_and_data: self
                    .paymaster_and_data
                    .ok_or(BundlerError::MissingPaymaster(version))?,
            },
            EntryPointVersion::V07 => Sponsorship::V07(Some(PaymasterData {
                paymaster: self.paymaster.ok_or(BundlerError::MissingPaymaster(version))?,
                paymaster_data: self.paymaster_data.unwrap_or_default(),
                paymaster_verification_gas_limit: self
                    .paymaster_verification_gas_limit
                    .unwrap_or(U256::from(DEFAULT_PAYMASTER_VERIFICATION_GAS_LIMIT)),
                paymaster_post_op_gas_limit: self
                    .paymaster_post_op_gas_limit
                    .unwrap_or(U256::from(DEFAULT_PAYMASTER_POST_OP_GAS_LIMIT)),
            })),
        };

        let gas = match (self.call_gas_limit, self.verification_gas_limit, self.pre_verification_gas)
        {
            (Some(call), Some(verification), Some(pre_verification)) => {
                Some(GasEstimate::new(call, verification, pre_verification))
            }
            _ => None,
        };
        let fees = match (self.max_fee_per_gas, self.max_priority_fee_per_gas) {
            (Some(max_fee), Some(priority)) => Some(FeeEstimate::new(max_fee, priority)),
            _ => None,
        };

        Ok(SponsorshipResponse { gas, fees, sponsorship })
    }
}

/// The only field of `eth_getBlockByNumber` the client reads.
#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BlockBaseFee {
    #[serde(default)]
    pub(crate) base_fee_per_gas: Option<U256>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use userop_types::Multiplier;

    #[test]
    fn v07_defaults_paymaster_gas() {
        let raw: RawSponsorshipResponse = serde_json::from_str(
            r#"{
                "paymaster": "0x9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a",
                "paymasterData": "0xbeef",
                "callGasLimit": "0x100",
                "verificationGasLimit": "0x200",
                "preVerificationGas": "0x300",
                "maxFeePerGas": "0x10"
            }"#,
        )
        .unwrap();
        let response = raw.into_response(EntryPointVersion::V07).unwrap();

        let Sponsorship::V07(Some(data)) = &response.sponsorship else {
            panic!("expected v0.7 sponsorship");
        };
        assert_eq!(data.paymaster_verification_gas_limit, U256::from(100_000));
        assert_eq!(data.paymaster_post_op_gas_limit, U256::from(50_000));
        assert_eq!(data.paymaster_data, Bytes::from_static(&[0xbe, 0xef]));
        assert_eq!(
            response.gas,
            Some(GasEstimate::new(U256::from(0x100), U256::from(0x200), U256::from(0x300)))
        );
        // priority fee missing
        assert_eq!(response.fees, None);
    }

    #[test]
    fn missing_paymaster_is_an_error() {
        let raw = RawSponsorshipResponse { paymaster: Some(Address::ZERO), ..Default::default() };
        assert!(matches!(
            raw.into_response(EntryPointVersion::V06),
            Err(BundlerError::MissingPaymaster(EntryPointVersion::V06))
        ));
        assert!(matches!(
            RawSponsorshipResponse::default().into_response(EntryPointVersion::V07),
            Err(BundlerError::MissingPaymaster(EntryPointVersion::V07))
        ));
    }

    #[test]
    fn overrides_only_when_present() {
        let no_options = FeeOptions::default();
        assert_eq!(GasOverrides::from_overrides(&OperationOverrides::new(), &no_options), None);

        let overrides = OperationOverrides::new()
            .with_max_fee_per_gas(FieldOverride::multiplier(Multiplier::BASE_FEE_BUFFER))
            .with_nonce(U256::from(4));
        let gas = GasOverrides::from_overrides(&overrides, &no_options).unwrap();
        let json = serde_json::to_value(gas).unwrap();
        assert_eq!(json, serde_json::json!({ "maxFeePerGas": { "multiplier": "1.5" } }));
    }

    #[test]
    fn override_beats_option_multiplier() {
        let options = FeeOptions {
            max_fee_per_gas: Some(FeeOption::multiplier(Multiplier::REPLACEMENT_BUMP)),
            call_gas_limit: Some(FeeOption::default().with_max(U256::from(10))),
            pre_verification_gas: Some(FeeOption::multiplier(Multiplier::BASE_FEE_BUFFER)),
            ..Default::default()
        };
        let overrides = OperationOverrides::new()
            .with_max_fee_per_gas(FieldOverride::absolute(U256::from(9)));
        let gas = GasOverrides::from_overrides(&overrides, &options).unwrap();

        assert_eq!(gas.max_fee_per_gas, Some(FieldOverride::absolute(U256::from(9))));
        assert_eq!(
            gas.pre_verification_gas,
            Some(FieldOverride::multiplier(Multiplier::BASE_FEE_BUFFER))
        );
        // bounds alone are not forwarded
        assert_eq!(gas.call_gas_limit, None);
    }
}
