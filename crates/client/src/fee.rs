//! Fee resolution and replacement pricing.

use crate::{Bundler, OperationState, PipelineError};
use alloy::primitives::{Address, U256};
use futures_util::try_join;
use tracing::{debug, instrument};
use userop_types::{
    bigint_max, resolve_field, FeeEstimate, FeeOptions, Multiplier, OperationOverrides,
    PendingOperation, RoundingMode, ScaleError, UserOperation,
};

/// Derive fees from the network's base fee and priority fee suggestion.
///
/// The priority fee is resolved first. Without an override, `maxFeePerGas`
/// is 1.5 times the base fee plus the resolved priority fee, before fee
/// options apply.
pub fn network_fees(
    base_fee: U256,
    priority_fee: U256,
    overrides: &OperationOverrides,
    options: &FeeOptions,
) -> Result<FeeEstimate, ScaleError> {
    let max_priority_fee_per_gas = resolve_field(
        priority_fee,
        overrides.max_priority_fee_per_gas.as_ref(),
        options.max_priority_fee_per_gas.as_ref(),
    )?;
    let estimate = Multiplier::BASE_FEE_BUFFER
        .apply_unsigned(base_fee, RoundingMode::Ceil)?
        .checked_add(max_priority_fee_per_gas)
        .ok_or(ScaleError::Overflow)?;
    let max_fee_per_gas = resolve_field(
        estimate,
        overrides.max_fee_per_gas.as_ref(),
        options.max_fee_per_gas.as_ref(),
    )?;
    Ok(FeeEstimate::new(max_fee_per_gas, max_priority_fee_per_gas))
}

/// The lowest fees a bundler accepts for a replacement of an operation
/// carrying `existing`.
pub fn replacement_floor(existing: FeeEstimate) -> Result<FeeEstimate, ScaleError> {
    let bump = |fee| Multiplier::REPLACEMENT_BUMP.apply_unsigned(fee, RoundingMode::Ceil);
    Ok(FeeEstimate::new(
        bump(existing.max_fee_per_gas)?,
        bump(existing.max_priority_fee_per_gas)?,
    ))
}

/// Raise each fee to at least the floor.
pub fn raise_to(fees: FeeEstimate, floor: FeeEstimate) -> FeeEstimate {
    FeeEstimate::new(
        bigint_max(fees.max_fee_per_gas, floor.max_fee_per_gas),
        bigint_max(fees.max_priority_fee_per_gas, floor.max_priority_fee_per_gas),
    )
}

/// The replacement floor above every operation in `held`, if any.
fn floor_above<'a>(
    held: impl IntoIterator<Item = &'a UserOperation>,
) -> Result<Option<FeeEstimate>, ScaleError> {
    let existing = held.into_iter().map(UserOperation::fees).reduce(raise_to);
    existing.map(replacement_floor).transpose()
}

async fn network_estimate<B>(
    bundler: &B,
    sender: Address,
    nonce: U256,
    overrides: &OperationOverrides,
    options: &FeeOptions,
) -> Result<(FeeEstimate, Option<UserOperation>), PipelineError>
where
    B: Bundler + Sync,
{
    let (base_fee, priority_fee, in_flight) = try_join!(
        bundler.base_fee(),
        bundler.max_priority_fee(),
        bundler.pending_operation(sender, nonce),
    )
    .map_err(PipelineError::stage(OperationState::FeesResolved))?;
    debug!(%base_fee, %priority_fee, "network fees");
    Ok((network_fees(base_fee, priority_fee, overrides, options)?, in_flight))
}

/// Resolve the fees of `op`.
///
/// Fees chosen by the paymaster stand in for the network estimate and skip
/// the fee RPCs. Either way, if the bundler already holds an operation for
/// the same sender and nonce, or `replacing` is given, the result is raised
/// to the replacement floor of the highest fees among them.
#[instrument(skip_all, fields(sender = %op.sender, nonce = %op.nonce))]
pub async fn resolve_fees<B>(
    bundler: &B,
    op: &PendingOperation,
    sponsored: Option<FeeEstimate>,
    replacing: Option<&UserOperation>,
    overrides: &OperationOverrides,
    options: &FeeOptions,
) -> Result<FeeEstimate, PipelineError>
where
    B: Bundler + Sync,
{
    let (fees, in_flight) = match sponsored {
        Some(fees) => {
            debug!("using paymaster fees");
            let in_flight = bundler
                .pending_operation(op.sender, op.nonce)
                .await
                .map_err(PipelineError::stage(OperationState::FeesResolved))?;
            (fees, in_flight)
        }
        None => network_estimate(bundler, op.sender, op.nonce, overrides, options).await?,
    };

    match floor_above(in_flight.iter().chain(replacing))? {
        Some(floor) => {
            debug!(
                max_fee_floor = %floor.max_fee_per_gas,
                priority_fee_floor = %floor.max_priority_fee_per_gas,
                "pricing a replacement"
            );
            Ok(raise_to(fees, floor))
        }
        None => Ok(fees),
    }
}

/// Price a replacement of `op` before it is rebuilt.
///
/// The network estimate under the caller's overrides, raised to the
/// replacement floor of `op` and of whatever the bundler holds for the same
/// sender and nonce. The result is pinned as absolute fee overrides so the
/// paymaster quotes these fees.
#[instrument(skip_all, fields(sender = %op.sender(), nonce = %op.nonce()))]
pub async fn replacement_fees<B>(
    bundler: &B,
    op: &UserOperation,
    overrides: &OperationOverrides,
    options: &FeeOptions,
) -> Result<FeeEstimate, PipelineError>
where
    B: Bundler + Sync,
{
    let (fees, in_flight) =
        network_estimate(bundler, op.sender(), op.nonce(), overrides, options).await?;
    let floor = floor_above(in_flight.iter().chain(Some(op)))?;
    Ok(floor.map_or(fees, |floor| raise_to(fees, floor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use userop_types::{FeeOption, FieldOverride};

    const GWEI: u64 = 1_000_000_000;

    fn gwei(n: u64) -> U256 {
        U256::from(n * GWEI)
    }

    #[test]
    fn max_fee_buffers_base_fee() {
        let fees =
            network_fees(gwei(10), gwei(2), &OperationOverrides::new(), &FeeOptions::default())
                .unwrap();
        assert_eq!(fees, FeeEstimate::new(gwei(17), gwei(2)));
    }

    #[test]
    fn priority_override_feeds_max_fee() {
        let overrides = OperationOverrides::new()
            .with_max_priority_fee_per_gas(FieldOverride::multiplier(Multiplier::from_integer(2)));
        let options = FeeOptions {
            max_fee_per_gas: Some(FeeOption::default().with_min(gwei(100))),
            ..Default::default()
        };
        let fees = network_fees(gwei(10), gwei(2), &overrides, &options).unwrap();
        assert_eq!(fees.max_priority_fee_per_gas, gwei(4));
        assert_eq!(fees.max_fee_per_gas, gwei(100));

        let absolute =
            OperationOverrides::new().with_max_fee_per_gas(FieldOverride::absolute(gwei(1)));
        let fees = network_fees(gwei(10), gwei(2), &absolute, &options).unwrap();
        assert_eq!(fees.max_fee_per_gas, gwei(1));
    }

    #[test]
    fn odd_base_fee_rounds_up() {
        let fees = network_fees(
            U256::from(3),
            U256::ZERO,
            &OperationOverrides::new(),
            &FeeOptions::default(),
        )
        .unwrap();
        assert_eq!(fees.max_fee_per_gas, U256::from(5));
    }

    #[test]
    fn replacement_beats_a_lower_estimate() {
        let existing = FeeEstimate::new(U256::from(1001), U256::from(101));
        let floor = replacement_floor(existing).unwrap();
        assert_eq!(floor, FeeEstimate::new(U256::from(1102), U256::from(112)));

        let fresh = FeeEstimate::new(U256::from(900), U256::from(200));
        assert_eq!(raise_to(fresh, floor), FeeEstimate::new(U256::from(1102), U256::from(200)));
    }
}
