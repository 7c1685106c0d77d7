use crate::{
    Bundler, OperationIntent, OperationSigner, OperationState, Paymaster, Pipeline, PipelineError,
    SmartAccount,
};
use alloy::primitives::B256;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use userop_constants::{
    EntryPoint, DEFAULT_RECEIPT_MAX_ATTEMPTS, DEFAULT_RECEIPT_POLL_INTERVAL_MS,
};
use userop_types::{
    ClientConfig, FeeOptions, OperationOverrides, ReceiptStatus, SponsorshipPolicy,
    UserOperation, UserOperationReceipt,
};

/// Settings shared by every operation an [`OperationSender`] sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderConfig {
    /// Chain id, part of every operation hash.
    pub chain_id: u64,
    /// Paymaster policy. Operations are self-sponsored without one.
    pub policy: Option<SponsorshipPolicy>,
    /// Fee-policy options applied to network estimates.
    pub fee_options: FeeOptions,
    /// Time between receipt polls.
    pub receipt_poll_interval: Duration,
    /// Receipt polls before giving up.
    pub receipt_max_attempts: u32,
}

impl SenderConfig {
    /// Create a config with no policy, no fee options and default receipt
    /// polling.
    pub const fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            policy: None,
            fee_options: FeeOptions {
                call_gas_limit: None,
                verification_gas_limit: None,
                pre_verification_gas: None,
                max_fee_per_gas: None,
                max_priority_fee_per_gas: None,
            },
            receipt_poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            receipt_max_attempts: DEFAULT_RECEIPT_MAX_ATTEMPTS,
        }
    }

    /// Set the sponsorship policy.
    pub fn with_policy(mut self, policy: SponsorshipPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Set the fee options.
    pub fn with_fee_options(mut self, fee_options: FeeOptions) -> Self {
        self.fee_options = fee_options;
        self
    }

    /// Set how receipts are polled.
    pub fn with_receipt_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.receipt_poll_interval = interval;
        self.receipt_max_attempts = max_attempts;
        self
    }
}

impl From<&ClientConfig> for SenderConfig {
    fn from(config: &ClientConfig) -> Self {
        Self {
            chain_id: config.chain_id,
            policy: config.policy.clone(),
            fee_options: FeeOptions::default(),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            receipt_max_attempts: config.receipt_max_attempts,
        }
    }
}

/// Builds, signs and submits operations from one smart account.
///
/// `OperationSender` is generic over:
/// - `B`: A [`Bundler`] for estimation, fee data and submission
/// - `P`: A [`Paymaster`] for sponsorship
/// - `A`: The [`SmartAccount`] operations are sent from
/// - `S`: The [`OperationSigner`] that authorizes them
#[derive(Debug, Clone)]
pub struct OperationSender<B, P, A, S> {
    bundler: B,
    paymaster: P,
    account: A,
    signer: S,
    config: SenderConfig,
}

impl<B, P, A, S> OperationSender<B, P, A, S> {
    /// Create a new sender.
    pub const fn new(bundler: B, paymaster: P, account: A, signer: S, config: SenderConfig) -> Self {
        Self { bundler, paymaster, account, signer, config }
    }

    /// Get a reference to the bundler.
    pub const fn bundler(&self) -> &B {
        &self.bundler
    }

    /// Get a reference to the paymaster.
    pub const fn paymaster(&self) -> &P {
        &self.paymaster
    }

    /// Get a reference to the account.
    pub const fn account(&self) -> &A {
        &self.account
    }

    /// Get a reference to the signer.
    pub const fn signer(&self) -> &S {
        &self.signer
    }

    /// Get a reference to the config.
    pub const fn config(&self) -> &SenderConfig {
        &self.config
    }
}

impl<B, P, A, S> OperationSender<B, P, A, S>
where
    A: SmartAccount,
{
    /// The entry point operations are sent through.
    pub fn entry_point(&self) -> EntryPoint {
        self.account.entry_point()
    }
}

impl<B, P, A, S> OperationSender<B, P, A, S>
where
    B: Bundler + Sync,
{
    /// Submit an already signed operation. Returns its hash.
    #[instrument(skip_all, fields(sender = %op.sender(), nonce = %op.nonce()))]
    pub async fn submit(&self, op: &UserOperation) -> Result<B256, PipelineError> {
        let hash = self
            .bundler
            .send_operation(op)
            .await
            .map_err(PipelineError::stage(OperationState::Submitted))?;
        debug!(%hash, "operation submitted");
        Ok(hash)
    }

    /// Poll for the receipt of a submitted operation.
    ///
    /// A receipt reporting failure is an error carrying the revert reason.
    /// Giving up after the configured number of polls is a timeout.
    #[instrument(skip(self))]
    pub async fn wait_for_receipt(&self, hash: B256) -> Result<UserOperationReceipt, PipelineError> {
        let attempts = self.config.receipt_max_attempts.max(1);
        for attempt in 1..=attempts {
            let receipt = self
                .bundler
                .operation_receipt(hash)
                .await
                .map_err(PipelineError::stage(OperationState::Submitted))?;

            match (ReceiptStatus::from_receipt(receipt.as_ref()), receipt) {
                (ReceiptStatus::Success, Some(receipt)) => {
                    debug!(attempt, tx = %receipt.receipt.transaction_hash, "operation included");
                    return Ok(receipt);
                }
                (ReceiptStatus::Failed { reason }, _) => {
                    warn!(?reason, "operation reverted");
                    return Err(PipelineError::Rejected { hash, reason });
                }
                _ => debug!(attempt, "receipt pending"),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.receipt_poll_interval).await;
            }
        }
        Err(PipelineError::ReceiptTimeout { hash, attempts })
    }
}

impl<B, P, A, S> OperationSender<B, P, A, S>
where
    B: Bundler + Sync,
    P: Paymaster + Sync,
    A: SmartAccount + Sync,
    S: OperationSigner + Sync,
{
    /// Start a pipeline run. Useful to drive stages one at a time.
    pub fn pipeline(&self) -> Pipeline<'_, B, P, A, S> {
        Pipeline::new(self)
    }

    /// Build, price, sponsor and sign an operation without submitting it.
    pub async fn build(&self, intent: &OperationIntent) -> Result<UserOperation, PipelineError> {
        self.pipeline().run(intent).await
    }

    /// Build and submit an operation. Returns its hash.
    pub async fn send(&self, intent: &OperationIntent) -> Result<B256, PipelineError> {
        let mut pipeline = self.pipeline();
        let op = pipeline.run(intent).await?;
        pipeline.submit(&op).await
    }

    /// Build and submit an operation, then wait for its receipt.
    pub async fn send_and_wait(
        &self,
        intent: &OperationIntent,
    ) -> Result<UserOperationReceipt, PipelineError> {
        let hash = self.send(intent).await?;
        self.wait_for_receipt(hash).await
    }

    /// Replace a submitted operation that is not yet included.
    ///
    /// The replacement keeps the sender, nonce, calldata and deployment data
    /// of `op`. Its fees are at least 10% above those of `op` and of any
    /// operation the bundler holds for the same nonce.
    pub async fn drop_and_replace(
        &self,
        op: &UserOperation,
        overrides: &OperationOverrides,
    ) -> Result<B256, PipelineError> {
        let mut pipeline = self.pipeline();
        let replacement = pipeline.run_replacement(op, overrides).await?;
        pipeline.submit(&replacement).await
    }
}
