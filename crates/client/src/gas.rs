//! Gas limit resolution.

use crate::{Bundler, OperationState, PipelineError};
use tracing::{debug, instrument};
use userop_types::{
    resolve_field, FeeOptions, GasEstimate, OperationOverrides, PendingOperation, ScaleError,
};

/// Apply overrides and fee options to a network estimate, field by field.
pub fn apply_gas_overrides(
    estimate: GasEstimate,
    overrides: &OperationOverrides,
    options: &FeeOptions,
) -> Result<GasEstimate, ScaleError> {
    Ok(GasEstimate {
        call_gas_limit: resolve_field(
            estimate.call_gas_limit,
            overrides.call_gas_limit.as_ref(),
            options.call_gas_limit.as_ref(),
        )?,
        verification_gas_limit: resolve_field(
            estimate.verification_gas_limit,
            overrides.verification_gas_limit.as_ref(),
            options.verification_gas_limit.as_ref(),
        )?,
        pre_verification_gas: resolve_field(
            estimate.pre_verification_gas,
            overrides.pre_verification_gas.as_ref(),
            options.pre_verification_gas.as_ref(),
        )?,
        ..estimate
    })
}

/// Resolve the gas limits of `op`.
///
/// Limits chosen by the paymaster are used as they are, since the
/// paymaster was sent the same overrides. If every limit is an absolute
/// override the bundler is not asked.
#[instrument(skip_all, fields(sender = %op.sender, nonce = %op.nonce))]
pub async fn resolve_gas<B>(
    bundler: &B,
    op: &PendingOperation,
    sponsored: Option<GasEstimate>,
    overrides: &OperationOverrides,
    options: &FeeOptions,
) -> Result<GasEstimate, PipelineError>
where
    B: Bundler + Sync,
{
    if let Some(gas) = sponsored {
        debug!("using paymaster gas limits");
        return Ok(gas);
    }
    if let Some((call, verification, pre_verification)) = overrides.absolute_gas() {
        debug!("gas limits fully overridden");
        return Ok(GasEstimate::new(call, verification, pre_verification));
    }

    let estimate = bundler
        .estimate_gas(&op.to_placeholder()?)
        .await
        .map_err(PipelineError::stage(OperationState::GasEstimated))?;
    Ok(apply_gas_overrides(estimate, overrides, options)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use userop_types::{FeeOption, FieldOverride, Multiplier};

    #[test]
    fn overrides_then_options() {
        let estimate = GasEstimate {
            paymaster_verification_gas_limit: Some(U256::from(7)),
            ..GasEstimate::new(U256::from(1000), U256::from(2000), U256::from(333))
        };
        let overrides = OperationOverrides::new()
            .with_call_gas_limit(FieldOverride::absolute(U256::from(5)))
            .with_pre_verification_gas(FieldOverride::multiplier("1.1".parse().unwrap()));
        let options = FeeOptions {
            verification_gas_limit: Some(
                FeeOption::multiplier(Multiplier::BASE_FEE_BUFFER).with_max(U256::from(2500)),
            ),
            pre_verification_gas: Some(FeeOption::multiplier(Multiplier::from_integer(10))),
            ..Default::default()
        };

        let gas = apply_gas_overrides(estimate, &overrides, &options).unwrap();
        assert_eq!(gas.call_gas_limit, U256::from(5));
        assert_eq!(gas.verification_gas_limit, U256::from(2500));
        // 333 * 1.1 = 366.3, rounded up; the option is ignored
        assert_eq!(gas.pre_verification_gas, U256::from(367));
        assert_eq!(gas.paymaster_verification_gas_limit, Some(U256::from(7)));
    }
}
