use crate::{
    fee, gas, Bundler, OperationSender, OperationSigner, Paymaster, SmartAccount,
    SponsorshipOutcome, SponsorshipStage,
};
use alloy::primitives::{Address, Bytes, B256};
use std::fmt;
use tracing::{debug, instrument, warn, Span};
use userop_constants::EntryPointVersion;
use userop_types::{
    multisig::AggregationError, Call, FeeOptions, OperationError, OperationOverrides,
    OverrideError, PendingOperation, ScaleError, UserOperation,
};

/// Stages of an operation run, in order.
///
/// A run starts in [`Building`] and moves forward one stage at a time.
/// Any stage may fail, which moves the run to [`Failed`].
///
/// [`Building`]: OperationState::Building
/// [`Failed`]: OperationState::Failed
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Identity fields, calldata and stub data are being assembled.
    Building,
    /// Gas limits are set.
    GasEstimated,
    /// Fee fields are set.
    FeesResolved,
    /// Final sponsorship is attached.
    Sponsored,
    /// The account signature is attached.
    Signed,
    /// The bundler accepted the operation.
    Submitted,
    /// A stage failed. Terminal.
    Failed,
}

impl OperationState {
    /// True for states no run moves out of.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted | Self::Failed)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Building => "building",
            Self::GasEstimated => "gas estimation",
            Self::FeesResolved => "fee resolution",
            Self::Sponsored => "sponsorship",
            Self::Signed => "signing",
            Self::Submitted => "submission",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Errors returned by an operation run.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The intent has no calls.
    #[error("operation has no calls")]
    NoCalls,
    /// An override or fee option is malformed.
    #[error("invalid overrides: {0}")]
    Overrides(#[from] OverrideError),
    /// Decimal scaling failed.
    #[error("fee arithmetic failed: {0}")]
    Precision(#[from] ScaleError),
    /// The operation could not be assembled.
    #[error(transparent)]
    Operation(#[from] OperationError),
    /// The account is not at the address its factory derives.
    #[error("account address {address} does not match derived address {derived}")]
    AddressMismatch {
        /// The account's address.
        address: Address,
        /// The derived address.
        derived: Address,
    },
    /// The signer does not own the multisig account.
    #[error("signer {0} is not an owner of the account")]
    NotOwner(Address),
    /// The signer has already contributed to the proposal.
    #[error("signer {0} has already signed this proposal")]
    AlreadySigned(Address),
    /// The proposal was built for another account.
    #[error("proposal is for account {proposed}, this sender uses {account}")]
    WrongAccount {
        /// The proposal's sender.
        proposed: Address,
        /// This sender's account.
        account: Address,
    },
    /// Signatures could not be aggregated.
    #[error(transparent)]
    Aggregation(#[from] AggregationError),
    /// A collaborator failed during a stage.
    #[error("{stage} failed: {source}")]
    Stage {
        /// The stage that failed.
        stage: OperationState,
        /// The collaborator's error.
        #[source]
        source: Box<dyn core::error::Error + Send + Sync>,
    },
    /// The operation was included but reverted.
    #[error(
        "operation {hash} reverted: {}",
        reason.as_deref().unwrap_or("no reason given")
    )]
    Rejected {
        /// The operation hash.
        hash: B256,
        /// The revert reason reported by the bundler.
        reason: Option<String>,
    },
    /// No receipt appeared in time.
    #[error("no receipt for operation {hash} after {attempts} attempts")]
    ReceiptTimeout {
        /// The operation hash.
        hash: B256,
        /// Polls made.
        attempts: u32,
    },
}

impl PipelineError {
    /// Wrap a collaborator error raised during `stage`.
    pub fn stage<E>(stage: OperationState) -> impl FnOnce(E) -> Self
    where
        E: core::error::Error + Send + Sync + 'static,
    {
        move |error| Self::Stage { stage, source: Box::new(error) }
    }

    /// The stage a collaborator failed in, if this is a stage error.
    pub const fn failed_stage(&self) -> Option<OperationState> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The collaborator error, if it has type `E`.
    pub fn downcast_source<E: core::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Stage { source, .. } => source.downcast_ref(),
            _ => None,
        }
    }
}

/// What the caller wants an operation to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationIntent {
    /// Calls the account executes, in order.
    pub calls: Vec<Call>,
    /// Caller overrides.
    pub overrides: OperationOverrides,
}

impl OperationIntent {
    /// Create an intent for a batch of calls.
    pub const fn new(calls: Vec<Call>) -> Self {
        Self { calls, overrides: OperationOverrides::new() }
    }

    /// Create an intent for a single call.
    pub fn call(call: Call) -> Self {
        Self::new(vec![call])
    }

    /// Set the overrides.
    pub fn with_overrides(mut self, overrides: OperationOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Check the intent before anything is sent over the network.
    pub fn validate(
        &self,
        version: EntryPointVersion,
        fee_options: &FeeOptions,
    ) -> Result<(), PipelineError> {
        self.overrides.validate(version)?;
        fee_options.validate()?;
        if self.calls.is_empty() {
            return Err(PipelineError::NoCalls);
        }
        Ok(())
    }
}

/// One run of the operation pipeline.
///
/// Each stage sees the operation as left by the stages before it and fills
/// only its own fields. The run owns its sponsorship cache, so unrelated
/// runs never share paymaster responses.
#[derive(Debug)]
pub struct Pipeline<'a, B, P, A, S> {
    sender: &'a OperationSender<B, P, A, S>,
    sponsorship: SponsorshipStage<'a, P>,
    stub_signature: Bytes,
    state: OperationState,
}

impl<'a, B, P, A, S> Pipeline<'a, B, P, A, S>
where
    A: SmartAccount,
    S: OperationSigner,
{
    /// Start a run.
    pub fn new(sender: &'a OperationSender<B, P, A, S>) -> Self {
        let config = sender.config();
        Self {
            sponsorship: SponsorshipStage::new(
                sender.paymaster(),
                config.policy.as_ref(),
                sender.account().entry_point().address(),
                &config.fee_options,
            ),
            stub_signature: sender.signer().stub_signature(),
            sender,
            state: OperationState::Building,
        }
    }
}

impl<'a, B, P, A, S> Pipeline<'a, B, P, A, S> {
    /// Use a different placeholder signature while estimating and
    /// sponsoring.
    pub fn with_stub_signature(mut self, stub_signature: Bytes) -> Self {
        self.stub_signature = stub_signature;
        self
    }

    /// The stage the run has reached.
    pub const fn state(&self) -> OperationState {
        self.state
    }

    /// The run's sponsorship stage.
    pub const fn sponsorship(&self) -> &SponsorshipStage<'a, P> {
        &self.sponsorship
    }

    /// Record the outcome of a stage.
    fn settle<T>(
        &mut self,
        next: OperationState,
        result: Result<T, PipelineError>,
    ) -> Result<T, PipelineError> {
        match result {
            Ok(value) => {
                if next != self.state {
                    debug!(from = %self.state, to = %next, "operation advanced");
                }
                self.state = next;
                Ok(value)
            }
            Err(error) => {
                warn!(%error, stage = %next, "operation failed");
                self.state = OperationState::Failed;
                Err(error)
            }
        }
    }
}

impl<B, P, A, S> Pipeline<'_, B, P, A, S>
where
    B: Bundler + Sync,
    P: Paymaster + Sync,
    A: SmartAccount + Sync,
    S: OperationSigner + Sync,
{
    /// Assemble a new operation from an intent.
    ///
    /// Overrides, fee options and the call list are checked before any
    /// network call.
    pub async fn build(
        &mut self,
        intent: &OperationIntent,
    ) -> Result<PendingOperation, PipelineError> {
        let result = self.build_inner(intent).await;
        self.settle(OperationState::Building, result)
    }

    async fn build_inner(
        &self,
        intent: &OperationIntent,
    ) -> Result<PendingOperation, PipelineError> {
        let account = self.sender.account();
        let version = account.entry_point().version();
        intent.validate(version, &self.sender.config().fee_options)?;

        self.check_address().await?;
        let init_code =
            account.init_code().await.map_err(PipelineError::stage(OperationState::Building))?;
        let nonce = match intent.overrides.nonce {
            Some(nonce) => nonce,
            None => account.nonce().await.map_err(PipelineError::stage(OperationState::Building))?,
        };
        let call_data = account
            .encode_calls(&intent.calls)
            .map_err(PipelineError::stage(OperationState::Building))?;

        let pending = PendingOperation::new(version, account.address(), nonce, call_data)
            .with_init_code(init_code);
        self.attach_stubs(pending, &intent.overrides).await
    }

    /// Start a new construction of an existing operation, keeping its
    /// sender, nonce, calldata and deployment data.
    pub async fn seed(
        &mut self,
        op: &UserOperation,
        overrides: &OperationOverrides,
    ) -> Result<PendingOperation, PipelineError> {
        let result = self.seed_inner(op, overrides).await;
        self.settle(OperationState::Building, result)
    }

    async fn seed_inner(
        &self,
        op: &UserOperation,
        overrides: &OperationOverrides,
    ) -> Result<PendingOperation, PipelineError> {
        overrides.validate(op.version())?;
        self.sender.config().fee_options.validate()?;
        let account = self.sender.account().address();
        if op.sender() != account {
            return Err(PipelineError::WrongAccount { proposed: op.sender(), account });
        }
        self.check_address().await?;
        self.attach_stubs(PendingOperation::seeded_from(op), overrides).await
    }

    async fn check_address(&self) -> Result<(), PipelineError> {
        let account = self.sender.account();
        let derived =
            account.derived_address().await.map_err(PipelineError::stage(OperationState::Building))?;
        if derived != account.address() {
            return Err(PipelineError::AddressMismatch { address: account.address(), derived });
        }
        Ok(())
    }

    async fn attach_stubs(
        &self,
        pending: PendingOperation,
        overrides: &OperationOverrides,
    ) -> Result<PendingOperation, PipelineError> {
        let mut pending = pending.with_signature(self.stub_signature.clone());
        let sponsorship = self.sponsorship.stub(&pending, &self.stub_signature, overrides).await?;
        pending.set_sponsorship(sponsorship)?;
        Ok(pending)
    }

    /// Set the gas limits.
    pub async fn estimate_gas(
        &mut self,
        pending: &mut PendingOperation,
        overrides: &OperationOverrides,
    ) -> Result<(), PipelineError> {
        let sponsored = self.sponsorship.cache().peek(&pending.fingerprint()).and_then(|r| r.gas);
        let result = gas::resolve_gas(
            self.sender.bundler(),
            pending,
            sponsored,
            overrides,
            &self.sender.config().fee_options,
        )
        .await;
        let estimate = self.settle(OperationState::GasEstimated, result)?;
        pending.set_gas(&estimate);
        Ok(())
    }

    /// Set the fee fields. `replacing` is an operation this one is meant to
    /// replace; the fees are raised above it.
    ///
    /// If the paymaster quoted fees and they had to be raised, its cached
    /// response no longer matches the operation and is dropped, so the
    /// sponsorship stage asks again for the raised fees.
    pub async fn resolve_fees(
        &mut self,
        pending: &mut PendingOperation,
        overrides: &OperationOverrides,
        replacing: Option<&UserOperation>,
    ) -> Result<(), PipelineError> {
        let fingerprint = pending.fingerprint();
        let sponsored = self.sponsorship.cache().peek(&fingerprint).and_then(|r| r.fees);
        let result = fee::resolve_fees(
            self.sender.bundler(),
            pending,
            sponsored,
            replacing,
            overrides,
            &self.sender.config().fee_options,
        )
        .await;
        let fees = self.settle(OperationState::FeesResolved, result)?;
        if sponsored.is_some_and(|quoted| quoted != fees) {
            debug!("paymaster fees raised, dropping its quote");
            self.sponsorship.cache().take(&fingerprint);
        }
        pending.set_fees(fees);
        Ok(())
    }

    /// Attach the final sponsorship.
    pub async fn sponsor(
        &mut self,
        pending: &mut PendingOperation,
        overrides: &OperationOverrides,
    ) -> Result<(), PipelineError> {
        let result = self
            .sponsorship
            .finalize(pending, &self.stub_signature, overrides)
            .await
            .and_then(|outcome| {
                pending.set_sponsorship(outcome.sponsorship().clone())?;
                Ok(outcome)
            });
        let outcome = self.settle(OperationState::Sponsored, result)?;
        debug!(
            sponsored = outcome.sponsorship().is_sponsored(),
            cached = matches!(outcome, SponsorshipOutcome::Cached(_)),
            "sponsorship attached"
        );
        Ok(())
    }

    /// Sign the operation hash and resolve the operation.
    pub async fn sign(&mut self, pending: &PendingOperation) -> Result<UserOperation, PipelineError> {
        let result = self.sign_inner(pending).await;
        self.settle(OperationState::Signed, result)
    }

    async fn sign_inner(&self, pending: &PendingOperation) -> Result<UserOperation, PipelineError> {
        let op = pending.resolve()?;
        let hash = op.hash(self.sender.entry_point().address(), self.sender.config().chain_id);
        let signature = self
            .sender
            .signer()
            .sign_bytes(hash.as_slice())
            .await
            .map_err(PipelineError::stage(OperationState::Signed))?;
        Ok(op.with_signature(signature))
    }

    /// Hand a signed operation to the bundler.
    pub async fn submit(&mut self, op: &UserOperation) -> Result<B256, PipelineError> {
        let result = self.sender.submit(op).await;
        self.settle(OperationState::Submitted, result)
    }

    /// Move an operation from building to sponsored.
    pub async fn prepare(
        &mut self,
        pending: &mut PendingOperation,
        overrides: &OperationOverrides,
        replacing: Option<&UserOperation>,
    ) -> Result<(), PipelineError> {
        self.estimate_gas(pending, overrides).await?;
        self.resolve_fees(pending, overrides, replacing).await?;
        self.sponsor(pending, overrides).await
    }

    /// Build, price, sponsor and sign an operation.
    #[instrument(skip_all, fields(sender = %self.sender.account().address(), nonce))]
    pub async fn run(&mut self, intent: &OperationIntent) -> Result<UserOperation, PipelineError> {
        let mut pending = self.build(intent).await?;
        Span::current().record("nonce", tracing::field::display(pending.nonce));
        debug!("operation built");
        self.prepare(&mut pending, &intent.overrides, None).await?;
        self.sign(&pending).await
    }

    /// Rebuild `op` with fresh gas, fees and sponsorship, priced to replace
    /// it.
    ///
    /// The replacement fees are settled first and pinned as overrides, so
    /// the paymaster sponsors the operation at the fees it is sent with.
    #[instrument(skip_all, fields(sender = %op.sender(), nonce = %op.nonce()))]
    pub async fn run_replacement(
        &mut self,
        op: &UserOperation,
        overrides: &OperationOverrides,
    ) -> Result<UserOperation, PipelineError> {
        let result = self.replacement_overrides(op, overrides).await;
        let overrides = self.settle(OperationState::Building, result)?;
        let mut pending = self.seed(op, &overrides).await?;
        self.prepare(&mut pending, &overrides, Some(op)).await?;
        self.sign(&pending).await
    }

    async fn replacement_overrides(
        &self,
        op: &UserOperation,
        overrides: &OperationOverrides,
    ) -> Result<OperationOverrides, PipelineError> {
        overrides.validate(op.version())?;
        let options = &self.sender.config().fee_options;
        options.validate()?;
        let fees = fee::replacement_fees(self.sender.bundler(), op, overrides, options).await?;
        debug!(
            max_fee_per_gas = %fees.max_fee_per_gas,
            max_priority_fee_per_gas = %fees.max_priority_fee_per_gas,
            "replacement fees"
        );
        Ok(overrides.clone().with_fees(fees))
    }
}
