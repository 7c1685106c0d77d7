use super::{AggregatedSignature, AggregationError, GasCommitment, SignerContribution, UpperLimits};
use crate::UserOperation;
use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

/// A multisig operation handed from one owner to the next.
///
/// The initiator builds the operation and signs it; each later owner adds a
/// contribution until the account's threshold is met. The operation carries
/// no signature of its own while in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigProposal {
    /// The operation as built by the initiator.
    pub operation: UserOperation,
    /// Values no signer may exceed.
    pub upper_limits: UpperLimits,
    /// What every contribution commits to.
    pub commitment: GasCommitment,
    /// Signatures collected so far, in signing order.
    pub contributions: Vec<SignerContribution>,
}

impl MultisigProposal {
    /// Start a proposal from the initiator's contribution.
    pub fn new(
        operation: UserOperation,
        upper_limits: UpperLimits,
        initiator: SignerContribution,
    ) -> Self {
        Self {
            operation,
            upper_limits,
            commitment: initiator.commitment,
            contributions: vec![initiator],
        }
    }

    /// True if `signer` has already contributed.
    pub fn has_signed(&self, signer: Address) -> bool {
        self.contributions.iter().any(|c| c.signer == signer)
    }

    /// Add a contribution. It must share the proposal's commitment mode.
    pub fn add(&mut self, contribution: SignerContribution) -> Result<(), AggregationError> {
        if contribution.commitment != self.commitment {
            return Err(AggregationError::MixedCommitments {
                expected: self.commitment,
                found: contribution.commitment,
                signer: contribution.signer,
            });
        }
        self.contributions.push(contribution);
        Ok(())
    }

    /// Aggregate the collected contributions in signing order.
    pub fn aggregate(&self) -> Result<AggregatedSignature, AggregationError> {
        AggregatedSignature::new(self.upper_limits, self.contributions.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FeeEstimate, GasEstimate, PendingOperation};
    use alloy::primitives::{Bytes, U256};
    use userop_constants::EntryPointVersion;

    fn proposal() -> MultisigProposal {
        let mut op = PendingOperation::new(
            EntryPointVersion::V06,
            Address::repeat_byte(0xac),
            U256::ZERO,
            Bytes::new(),
        );
        op.set_gas(&GasEstimate::new(U256::from(1), U256::from(2), U256::from(3)));
        op.set_fees(FeeEstimate::new(U256::from(4), U256::from(5)));
        let op = op.resolve().unwrap();
        let limits = UpperLimits::from_operation(&op);
        MultisigProposal::new(
            op,
            limits,
            SignerContribution::contract(Address::repeat_byte(1), Bytes::new(), GasCommitment::Actual),
        )
    }

    #[test]
    fn contributions_share_the_initiators_mode() {
        let mut proposal = proposal();
        assert!(proposal.has_signed(Address::repeat_byte(1)));
        assert!(!proposal.has_signed(Address::repeat_byte(2)));

        let upper = SignerContribution::contract(
            Address::repeat_byte(2),
            Bytes::new(),
            GasCommitment::UpperBound,
        );
        assert!(matches!(
            proposal.add(upper),
            Err(AggregationError::MixedCommitments { .. })
        ));
        assert_eq!(proposal.contributions.len(), 1);

        let actual =
            SignerContribution::contract(Address::repeat_byte(2), Bytes::new(), GasCommitment::Actual);
        proposal.add(actual).unwrap();
        assert_eq!(proposal.aggregate().unwrap().signers().count(), 2);
    }

    #[test]
    fn hand_off_json() {
        let proposal = proposal();
        let json = serde_json::to_value(&proposal).unwrap();
        assert_eq!(json["commitment"], "ACTUAL");
        assert_eq!(json["contributions"][0]["kind"], "CONTRACT");
        assert_eq!(json["upperLimits"]["maxFeePerGas"], "0x4");

        let back: MultisigProposal = serde_json::from_value(json).unwrap();
        assert_eq!(back, proposal);
    }
}
