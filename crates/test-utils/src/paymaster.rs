//! A mock paymaster that sponsors everything.

use alloy::primitives::{Bytes, U256};
use core::convert::Infallible;
use std::sync::{Arc, Mutex};
use userop_bundler::{SponsorshipRequest, SponsorshipResponse};
use userop_client::Paymaster;
use userop_constants::{
    test_utils::TEST_PAYMASTER, EntryPointVersion, DEFAULT_PAYMASTER_POST_OP_GAS_LIMIT,
    DEFAULT_PAYMASTER_VERIFICATION_GAS_LIMIT,
};
use userop_types::{FeeEstimate, GasEstimate, PaymasterData, Sponsorship};

/// Paymaster data returned by [`MockPaymaster`].
pub const MOCK_PAYMASTER_DATA: Bytes = Bytes::from_static(&[0xbe, 0xef]);

/// A mock [`Paymaster`] that records requests and sponsors every one of
/// them through [`TEST_PAYMASTER`].
///
/// When it picks fees, absolute fee overrides in the request take their
/// place.
#[derive(Debug, Clone, Default)]
pub struct MockPaymaster {
    requests: Arc<Mutex<Vec<SponsorshipRequest>>>,
    responses: Arc<Mutex<Vec<SponsorshipResponse>>>,
    gas: Option<GasEstimate>,
    fees: Option<FeeEstimate>,
}

impl MockPaymaster {
    /// Create a paymaster that leaves gas and fees to the pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also return these gas limits.
    pub const fn with_gas(mut self, gas: GasEstimate) -> Self {
        self.gas = Some(gas);
        self
    }

    /// Also return these fees.
    pub const fn with_fees(mut self, fees: FeeEstimate) -> Self {
        self.fees = Some(fees);
        self
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<SponsorshipRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Every response returned, in order.
    pub fn responses(&self) -> Vec<SponsorshipResponse> {
        self.responses.lock().unwrap().clone()
    }

    /// The number of requests received.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The sponsorship returned for operations of `version`.
    pub fn sponsorship(version: EntryPointVersion) -> Sponsorship {
        match version {
            EntryPointVersion::V06 => Sponsorship::V06 {
                paymaster_and_data: [TEST_PAYMASTER.as_slice(), MOCK_PAYMASTER_DATA.as_ref()]
                    .concat()
                    .into(),
            },
            EntryPointVersion::V07 => Sponsorship::V07(Some(PaymasterData {
                paymaster: TEST_PAYMASTER,
                paymaster_data: MOCK_PAYMASTER_DATA,
                paymaster_verification_gas_limit: U256::from(
                    DEFAULT_PAYMASTER_VERIFICATION_GAS_LIMIT,
                ),
                paymaster_post_op_gas_limit: U256::from(DEFAULT_PAYMASTER_POST_OP_GAS_LIMIT),
            })),
        }
    }
}

impl Paymaster for MockPaymaster {
    type Error = Infallible;

    async fn request_sponsorship(
        &self,
        request: &SponsorshipRequest,
    ) -> Result<SponsorshipResponse, Self::Error> {
        self.requests.lock().unwrap().push(request.clone());
        let pinned = request.overrides.and_then(|overrides| {
            Some(FeeEstimate::new(
                overrides.max_fee_per_gas?.as_absolute()?,
                overrides.max_priority_fee_per_gas?.as_absolute()?,
            ))
        });
        let response = SponsorshipResponse {
            gas: self.gas,
            fees: self.fees.map(|quoted| pinned.unwrap_or(quoted)),
            sponsorship: Self::sponsorship(request.version()),
        };
        self.responses.lock().unwrap().push(response.clone());
        Ok(response)
    }
}
