use crate::{
    Bundler, MultisigAccount, OperationIntent, OperationSender, OperationSigner, OperationState,
    Paymaster, PipelineError,
};
use alloy::primitives::{Address, Bytes, B256};
use tracing::{debug, instrument};
use userop_types::{
    multisig::{
        AggregatedSignature, GasCommitment, MultisigProposal, SignerContribution, UpperLimits,
    },
    FieldOverride, OperationOverrides, SponsorshipOverride, UserOperation, UserOperationReceipt,
};

/// Resolve a proposal into the operation submitted on-chain: the aggregate
/// of every contribution, ordered by signer address, as the signature.
pub fn assemble(proposal: &MultisigProposal) -> Result<UserOperation, PipelineError> {
    proposal.upper_limits.check(&proposal.operation)?;
    let aggregate = proposal.aggregate()?.sorted_by_signer();
    Ok(proposal.operation.clone().with_signature(aggregate.encode()?))
}

/// Sends operations from a threshold account, one owner at a time.
///
/// One owner [`propose`]s an operation and signs it. The proposal is handed
/// to the other owners, each of whom [`countersign`]s. The last one sends.
///
/// [`propose`]: MultisigSender::propose
/// [`countersign`]: MultisigSender::countersign
#[derive(Debug, Clone)]
pub struct MultisigSender<B, P, A, S> {
    inner: OperationSender<B, P, A, S>,
}

impl<B, P, A, S> MultisigSender<B, P, A, S> {
    /// Wrap a sender whose account is a threshold account.
    pub const fn new(inner: OperationSender<B, P, A, S>) -> Self {
        Self { inner }
    }

    /// Get the underlying sender.
    pub const fn sender(&self) -> &OperationSender<B, P, A, S> {
        &self.inner
    }

    /// Unwrap the underlying sender.
    pub fn into_inner(self) -> OperationSender<B, P, A, S> {
        self.inner
    }
}

impl<B, P, A, S> MultisigSender<B, P, A, S>
where
    B: Bundler + Sync,
    P: Paymaster + Sync,
    A: MultisigAccount + Sync,
    S: OperationSigner + Sync,
{
    async fn check_owner(&self) -> Result<Address, PipelineError> {
        let signer = self.inner.signer().address();
        let owners = self
            .inner
            .account()
            .owners()
            .await
            .map_err(PipelineError::stage(OperationState::Building))?;
        if !owners.contains(&signer) {
            return Err(PipelineError::NotOwner(signer));
        }
        Ok(signer)
    }

    /// A placeholder aggregate with one stub slot per required owner, so
    /// estimation sees a signature of the final length.
    async fn stub_signature(&self, commitment: GasCommitment) -> Result<Bytes, PipelineError> {
        let threshold = self
            .inner
            .account()
            .threshold()
            .await
            .map_err(PipelineError::stage(OperationState::Building))?;
        let signer = self.inner.signer();
        let stub = SignerContribution {
            signer: signer.address(),
            signature: signer.stub_signature(),
            kind: signer.kind(),
            commitment,
        };
        let aggregate =
            AggregatedSignature::new(UpperLimits::default(), vec![stub; threshold.max(1)])?;
        Ok(aggregate.encode()?)
    }

    async fn contribute(
        &self,
        op: &UserOperation,
        limits: &UpperLimits,
        commitment: GasCommitment,
    ) -> Result<SignerContribution, PipelineError> {
        let signer = self.inner.signer();
        let hash = limits.committed_hash(
            op,
            commitment,
            self.inner.entry_point().address(),
            self.inner.config().chain_id,
        );
        let signature = signer
            .sign_bytes(hash.as_slice())
            .await
            .map_err(PipelineError::stage(OperationState::Signed))?;
        Ok(SignerContribution { signer: signer.address(), signature, kind: signer.kind(), commitment })
    }

    /// Build an operation and sign it as the first owner.
    ///
    /// The operation's current `preVerificationGas` and fees become the
    /// upper limits every later signer agrees to.
    #[instrument(skip_all, fields(account = %self.inner.account().address(), %commitment))]
    pub async fn propose(
        &self,
        intent: &OperationIntent,
        commitment: GasCommitment,
    ) -> Result<MultisigProposal, PipelineError> {
        intent.validate(self.inner.entry_point().version(), &self.inner.config().fee_options)?;
        self.check_owner().await?;

        let stub = self.stub_signature(commitment).await?;
        let mut pipeline = self.inner.pipeline().with_stub_signature(stub);
        let mut pending = pipeline.build(intent).await?;
        pipeline.prepare(&mut pending, &intent.overrides, None).await?;

        let op = pending.resolve()?.with_signature(Bytes::new());
        let limits = UpperLimits::from_operation(&op);
        let contribution = self.contribute(&op, &limits, commitment).await?;
        debug!(nonce = %op.nonce(), "proposal created");
        Ok(MultisigProposal::new(op, limits, contribution))
    }

    /// Rebuild the proposal's operation with fresh `preVerificationGas` and
    /// fees, each capped by its upper limit. Call and verification gas and
    /// sponsorship stay fixed.
    ///
    /// A sponsored operation is kept as proposed: its paymaster data covers
    /// the proposed gas and fees.
    async fn rederive(&self, proposal: &MultisigProposal) -> Result<UserOperation, PipelineError> {
        let op = &proposal.operation;
        if op.sponsorship().is_sponsored() {
            debug!("sponsored proposal, keeping proposed gas and fees");
            return Ok(op.clone());
        }
        let overrides = OperationOverrides::new()
            .with_call_gas_limit(FieldOverride::absolute(op.call_gas_limit()))
            .with_verification_gas_limit(FieldOverride::absolute(op.verification_gas_limit()))
            .with_sponsorship(SponsorshipOverride::Fixed(op.sponsorship()));

        let stub = self.stub_signature(proposal.commitment).await?;
        let mut pipeline = self.inner.pipeline().with_stub_signature(stub);
        let mut pending = pipeline.seed(op, &overrides).await?;
        pipeline.estimate_gas(&mut pending, &overrides).await?;
        pipeline.resolve_fees(&mut pending, &overrides, None).await?;

        let estimated = pending.resolve()?;
        let (pre_verification_gas, fees) = proposal
            .upper_limits
            .cap(estimated.pre_verification_gas(), estimated.fees());
        pending.pre_verification_gas = Some(pre_verification_gas);
        pending.set_fees(fees);

        pipeline.sponsor(&mut pending, &overrides).await?;
        Ok(pending.resolve()?.with_signature(Bytes::new()))
    }

    /// Add this signer's contribution to a proposal.
    ///
    /// For [`GasCommitment::Actual`] the operation is signed as proposed.
    /// For [`GasCommitment::UpperBound`] an unsponsored operation is
    /// re-derived first, so the returned proposal may carry lower gas values.
    #[instrument(skip_all, fields(sender = %proposal.operation.sender(), nonce = %proposal.operation.nonce()))]
    pub async fn countersign(
        &self,
        proposal: &MultisigProposal,
    ) -> Result<MultisigProposal, PipelineError> {
        let account = self.inner.account().address();
        if proposal.operation.sender() != account {
            return Err(PipelineError::WrongAccount {
                proposed: proposal.operation.sender(),
                account,
            });
        }
        let signer = self.inner.signer().address();
        if proposal.has_signed(signer) {
            return Err(PipelineError::AlreadySigned(signer));
        }
        self.check_owner().await?;

        let operation = match proposal.commitment {
            GasCommitment::Actual => proposal.operation.clone(),
            GasCommitment::UpperBound => self.rederive(proposal).await?,
        };
        let contribution =
            self.contribute(&operation, &proposal.upper_limits, proposal.commitment).await?;

        let mut next = MultisigProposal { operation, ..proposal.clone() };
        next.add(contribution)?;
        debug!(signatures = next.contributions.len(), "proposal countersigned");
        Ok(next)
    }

    /// Countersign and submit. Returns the operation hash.
    pub async fn countersign_and_send(
        &self,
        proposal: &MultisigProposal,
    ) -> Result<B256, PipelineError> {
        let signed = self.countersign(proposal).await?;
        let op = assemble(&signed)?;
        self.inner.submit(&op).await
    }

    /// Countersign, submit and wait for the receipt.
    pub async fn countersign_and_wait(
        &self,
        proposal: &MultisigProposal,
    ) -> Result<UserOperationReceipt, PipelineError> {
        let hash = self.countersign_and_send(proposal).await?;
        self.inner.wait_for_receipt(hash).await
    }
}
