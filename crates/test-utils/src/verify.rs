//! Off-chain stand-ins for account validation.

use crate::MockContractSigner;
use alloy::primitives::{Address, Signature};
use userop_types::{
    multisig::{AggregatedSignature, GasCommitment, SignerKind},
    UserOperation,
};

/// Decides whether a submitted operation executes successfully. A failure
/// carries the revert reason put in the receipt.
pub trait OperationVerifier {
    /// Validate `op` as the entry point at `entry_point` would.
    fn verify(&self, op: &UserOperation, entry_point: Address, chain_id: u64)
        -> Result<(), String>;
}

/// Accepts every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl OperationVerifier for AcceptAll {
    fn verify(&self, _: &UserOperation, _: Address, _: u64) -> Result<(), String> {
        Ok(())
    }
}

/// Accepts operations carrying an EIP-191 signature of the operation hash
/// by a single owner.
#[derive(Debug, Clone, Copy)]
pub struct EoaVerifier {
    owner: Address,
}

impl EoaVerifier {
    /// Create a verifier for an account owned by `owner`.
    pub const fn new(owner: Address) -> Self {
        Self { owner }
    }
}

impl OperationVerifier for EoaVerifier {
    fn verify(
        &self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> Result<(), String> {
        let hash = op.hash(entry_point, chain_id);
        let recovered = Signature::from_raw(op.signature())
            .and_then(|sig| sig.recover_address_from_msg(hash.as_slice()))
            .map_err(|_| "AA24 signature error".to_string())?;
        if recovered != self.owner {
            return Err(format!("AA24 signature error: {recovered} is not the owner"));
        }
        Ok(())
    }
}

/// Accepts operations signed by `threshold` distinct owners, aggregated in
/// ascending signer order.
///
/// Contract owners are checked against [`MockContractSigner`]. In
/// upper-bound mode the operation must stay within the signed limits.
#[derive(Debug, Clone)]
pub struct ThresholdVerifier {
    owners: Vec<Address>,
    threshold: usize,
}

impl ThresholdVerifier {
    /// Create a verifier for a `threshold`-of-`owners` account.
    pub const fn new(owners: Vec<Address>, threshold: usize) -> Self {
        Self { owners, threshold }
    }
}

impl OperationVerifier for ThresholdVerifier {
    fn verify(
        &self,
        op: &UserOperation,
        entry_point: Address,
        chain_id: u64,
    ) -> Result<(), String> {
        let aggregate =
            AggregatedSignature::split(op.signature(), self.threshold, op, entry_point, chain_id)
                .map_err(|e| e.to_string())?;
        let limits = aggregate.upper_limits();
        if aggregate.commitment() == GasCommitment::UpperBound {
            limits.check(op).map_err(|e| e.to_string())?;
        }

        let mut previous: Option<Address> = None;
        for contribution in aggregate.contributions() {
            let signer = contribution.signer;
            if !self.owners.contains(&signer) {
                return Err(format!("{signer} is not an owner"));
            }
            if previous.is_some_and(|previous| previous >= signer) {
                return Err("signers not in ascending order".to_string());
            }
            if contribution.kind == SignerKind::Contract {
                let hash =
                    limits.committed_hash(op, contribution.commitment, entry_point, chain_id);
                let expected = MockContractSigner::signature_for(signer, hash.as_slice());
                if contribution.signature != expected {
                    return Err(format!("contract owner {signer} rejected its signature"));
                }
            }
            previous = Some(signer);
        }
        Ok(())
    }
}
