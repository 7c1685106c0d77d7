use crate::{clamp, FeeEstimate, Multiplier, RoundingMode, ScaleError, Sponsorship};
use alloy::primitives::U256;
use serde::{Deserialize, Serialize};
use userop_constants::EntryPointVersion;

/// Errors raised by malformed overrides or fee options. Detected before any
/// network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverrideError {
    /// A fee option's lower bound exceeds its upper bound.
    #[error("fee option for {field} has min {min} above max {max}")]
    InvertedBounds {
        /// The field name.
        field: &'static str,
        /// The lower bound.
        min: U256,
        /// The upper bound.
        max: U256,
    },
    /// Gas and fee values cannot be scaled below zero.
    #[error("multiplier for {field} is negative: {multiplier}")]
    NegativeMultiplier {
        /// The field name.
        field: &'static str,
        /// The multiplier.
        multiplier: Multiplier,
    },
    /// A sponsorship override is shaped for another entry point version.
    #[error("sponsorship override is for v{actual}, operation is v{expected}")]
    SponsorshipVersion {
        /// The operation's version.
        expected: EntryPointVersion,
        /// The override's version.
        actual: EntryPointVersion,
    },
}

/// A caller-supplied value for a gas or fee field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldOverride {
    /// Use exactly this value.
    Absolute(U256),
    /// Scale the network estimate.
    Multiplier {
        /// The multiplier.
        multiplier: Multiplier,
    },
}

impl FieldOverride {
    /// An absolute override.
    pub const fn absolute(value: U256) -> Self {
        Self::Absolute(value)
    }

    /// A multiplier override.
    pub const fn multiplier(multiplier: Multiplier) -> Self {
        Self::Multiplier { multiplier }
    }

    /// Apply to an estimate. Multipliers round up.
    pub fn apply(&self, estimate: U256) -> Result<U256, ScaleError> {
        match self {
            Self::Absolute(value) => Ok(*value),
            Self::Multiplier { multiplier } => {
                multiplier.apply_unsigned(estimate, RoundingMode::Ceil)
            }
        }
    }

    /// The absolute value, if this is an absolute override.
    pub const fn as_absolute(&self) -> Option<U256> {
        match self {
            Self::Absolute(value) => Some(*value),
            Self::Multiplier { .. } => None,
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), OverrideError> {
        match self {
            Self::Multiplier { multiplier } if multiplier.is_negative() => {
                Err(OverrideError::NegativeMultiplier { field, multiplier: *multiplier })
            }
            _ => Ok(()),
        }
    }
}

/// A fee-policy option for one field: scale the network estimate, then clamp
/// it into optional bounds.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeOption {
    /// Applied to the network estimate first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<Multiplier>,
    /// Lower bound on the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<U256>,
    /// Upper bound on the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<U256>,
}

impl FeeOption {
    /// An option that only scales.
    pub const fn multiplier(multiplier: Multiplier) -> Self {
        Self { multiplier: Some(multiplier), min: None, max: None }
    }

    /// Set the lower bound.
    pub const fn with_min(mut self, min: U256) -> Self {
        self.min = Some(min);
        self
    }

    /// Set the upper bound.
    pub const fn with_max(mut self, max: U256) -> Self {
        self.max = Some(max);
        self
    }

    /// Apply to an estimate.
    pub fn apply(&self, estimate: U256) -> Result<U256, ScaleError> {
        let scaled = match self.multiplier {
            Some(multiplier) => multiplier.apply_unsigned(estimate, RoundingMode::Ceil)?,
            None => estimate,
        };
        Ok(clamp(scaled, self.min, self.max))
    }

    fn validate(&self, field: &'static str) -> Result<(), OverrideError> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(OverrideError::InvertedBounds { field, min, max });
            }
        }
        match self.multiplier {
            Some(multiplier) if multiplier.is_negative() => {
                Err(OverrideError::NegativeMultiplier { field, multiplier })
            }
            _ => Ok(()),
        }
    }
}

/// Per-field fee-policy options.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeOptions {
    /// Option for `callGasLimit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_gas_limit: Option<FeeOption>,
    /// Option for `verificationGasLimit`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_gas_limit: Option<FeeOption>,
    /// Option for `preVerificationGas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_verification_gas: Option<FeeOption>,
    /// Option for `maxFeePerGas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<FeeOption>,
    /// Option for `maxPriorityFeePerGas`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<FeeOption>,
}

impl FeeOptions {
    /// Check every option for malformed bounds or multipliers.
    pub fn validate(&self) -> Result<(), OverrideError> {
        let fields = [
            ("callGasLimit", &self.call_gas_limit),
            ("verificationGasLimit", &self.verification_gas_limit),
            ("preVerificationGas", &self.pre_verification_gas),
            ("maxFeePerGas", &self.max_fee_per_gas),
            ("maxPriorityFeePerGas", &self.max_priority_fee_per_gas),
        ];
        fields
            .into_iter()
            .filter_map(|(name, option)| option.as_ref().map(|o| (name, o)))
            .try_for_each(|(name, option)| option.validate(name))
    }
}

/// Replace the sponsorship stage's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SponsorshipOverride {
    /// Skip the paymaster; the account pays for itself.
    SelfSponsored,
    /// Use this sponsorship as-is.
    Fixed(Sponsorship),
}

/// Caller overrides for an operation. An override always wins over the
/// corresponding network estimate and fee option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOverrides {
    /// Override for `callGasLimit`.
    pub call_gas_limit: Option<FieldOverride>,
    /// Override for `verificationGasLimit`.
    pub verification_gas_limit: Option<FieldOverride>,
    /// Override for `preVerificationGas`.
    pub pre_verification_gas: Option<FieldOverride>,
    /// Override for `maxFeePerGas`.
    pub max_fee_per_gas: Option<FieldOverride>,
    /// Override for `maxPriorityFeePerGas`.
    pub max_priority_fee_per_gas: Option<FieldOverride>,
    /// Use this nonce instead of asking the account.
    pub nonce: Option<U256>,
    /// Bypass or replace sponsorship.
    pub sponsorship: Option<SponsorshipOverride>,
}

impl OperationOverrides {
    /// Create empty overrides.
    pub const fn new() -> Self {
        Self {
            call_gas_limit: None,
            verification_gas_limit: None,
            pre_verification_gas: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            nonce: None,
            sponsorship: None,
        }
    }

    /// Set the `callGasLimit` override.
    pub const fn with_call_gas_limit(mut self, value: FieldOverride) -> Self {
        self.call_gas_limit = Some(value);
        self
    }

    /// Set the `verificationGasLimit` override.
    pub const fn with_verification_gas_limit(mut self, value: FieldOverride) -> Self {
        self.verification_gas_limit = Some(value);
        self
    }

    /// Set the `preVerificationGas` override.
    pub const fn with_pre_verification_gas(mut self, value: FieldOverride) -> Self {
        self.pre_verification_gas = Some(value);
        self
    }

    /// Set the `maxFeePerGas` override.
    pub const fn with_max_fee_per_gas(mut self, value: FieldOverride) -> Self {
        self.max_fee_per_gas = Some(value);
        self
    }

    /// Set the `maxPriorityFeePerGas` override.
    pub const fn with_max_priority_fee_per_gas(mut self, value: FieldOverride) -> Self {
        self.max_priority_fee_per_gas = Some(value);
        self
    }

    /// Pin both fee fields to `fees`.
    pub const fn with_fees(self, fees: FeeEstimate) -> Self {
        self.with_max_fee_per_gas(FieldOverride::absolute(fees.max_fee_per_gas))
            .with_max_priority_fee_per_gas(FieldOverride::absolute(fees.max_priority_fee_per_gas))
    }

    /// Both fee fields, if each is an absolute override.
    pub fn absolute_fees(&self) -> Option<FeeEstimate> {
        Some(FeeEstimate::new(
            self.max_fee_per_gas?.as_absolute()?,
            self.max_priority_fee_per_gas?.as_absolute()?,
        ))
    }

    /// Set the nonce.
    pub const fn with_nonce(mut self, nonce: U256) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set the sponsorship override.
    pub fn with_sponsorship(mut self, sponsorship: SponsorshipOverride) -> Self {
        self.sponsorship = Some(sponsorship);
        self
    }

    /// All three gas limits, if every one is an absolute override.
    pub fn absolute_gas(&self) -> Option<(U256, U256, U256)> {
        Some((
            self.call_gas_limit?.as_absolute()?,
            self.verification_gas_limit?.as_absolute()?,
            self.pre_verification_gas?.as_absolute()?,
        ))
    }

    /// Check the overrides against the operation's entry point version.
    pub fn validate(&self, version: EntryPointVersion) -> Result<(), OverrideError> {
        let fields = [
            ("callGasLimit", &self.call_gas_limit),
            ("verificationGasLimit", &self.verification_gas_limit),
            ("preVerificationGas", &self.pre_verification_gas),
            ("maxFeePerGas", &self.max_fee_per_gas),
            ("maxPriorityFeePerGas", &self.max_priority_fee_per_gas),
        ];
        fields
            .into_iter()
            .filter_map(|(name, value)| value.as_ref().map(|v| (name, v)))
            .try_for_each(|(name, value)| value.validate(name))?;

        if let Some(SponsorshipOverride::Fixed(sponsorship)) = &self.sponsorship {
            if sponsorship.version() != version {
                return Err(OverrideError::SponsorshipVersion {
                    expected: version,
                    actual: sponsorship.version(),
                });
            }
        }
        Ok(())
    }
}

/// Resolve one field: an override wins, else a fee option is applied to the
/// estimate, else the estimate is used as-is.
pub fn resolve_field(
    estimate: U256,
    field_override: Option<&FieldOverride>,
    option: Option<&FeeOption>,
) -> Result<U256, ScaleError> {
    match (field_override, option) {
        (Some(field_override), _) => field_override.apply(estimate),
        (None, Some(option)) => option.apply(estimate),
        (None, None) => Ok(estimate),
    }
}
