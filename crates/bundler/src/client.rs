use crate::{
    types::{BlockBaseFee, RawSponsorshipResponse, SponsorshipRequest, SponsorshipResponse},
    BundlerError, Result,
};
use alloy::{
    eips::BlockNumberOrTag,
    primitives::{Address, B256, U256},
    providers::{Provider, RootProvider},
    rpc::client::RpcClient,
    transports::http::{reqwest::Client, Http},
};
use tracing::{debug, instrument, warn};
use userop_constants::EntryPoint;
use userop_types::{ClientConfig, GasEstimate, UserOperation, UserOperationReceipt};

const GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
const MAX_PRIORITY_FEE: &str = "rundler_maxPriorityFeePerGas";
const PENDING_BY_SENDER_NONCE: &str = "rundler_getPendingUserOperationBySenderNonce";
const ESTIMATE_GAS: &str = "eth_estimateUserOperationGas";
const SEND_OPERATION: &str = "eth_sendUserOperation";
const GET_RECEIPT: &str = "eth_getUserOperationReceipt";
const REQUEST_SPONSORSHIP: &str = "alchemy_requestGasAndPaymasterAndData";

/// A JSON-RPC client for an ERC-4337 bundler and its paymaster methods.
///
/// Wraps any [`Provider`], so the transport, its retries and its layers are
/// chosen by the caller.
#[derive(Debug, Clone)]
pub struct BundlerClient<P = RootProvider> {
    /// The provider requests are sent through.
    provider: P,
    /// The entry point operations target.
    entry_point: EntryPoint,
}

impl BundlerClient {
    /// Connect over HTTP with a new HTTP client.
    pub fn new_http(url: url::Url, entry_point: EntryPoint) -> Self {
        Self::new(RootProvider::new_http(url), entry_point)
    }

    /// Connect over HTTP with the given client, e.g. one with custom
    /// headers or timeouts.
    pub fn new_with_client(url: url::Url, client: Client, entry_point: EntryPoint) -> Self {
        let transport = Http::with_client(client, url);
        let provider = RootProvider::new(RpcClient::new(transport, false));
        Self::new(provider, entry_point)
    }

    /// Connect to the bundler named in the config.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let url = url::Url::parse(&config.bundler_rpc_url)
            .inspect_err(|e| warn!(%e, "Failed to parse bundler URL"))?;
        Ok(Self::new_http(url, config.entry_point))
    }
}

impl<P> BundlerClient<P> {
    /// Create a client over an existing provider.
    pub const fn new(provider: P, entry_point: EntryPoint) -> Self {
        Self { provider, entry_point }
    }

    /// Get the provider.
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the entry point.
    pub const fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }
}

impl<P: Provider> BundlerClient<P> {
    /// Base fee of the latest block.
    #[instrument(skip_all)]
    pub async fn base_fee(&self) -> Result<U256> {
        let block: BlockBaseFee = self
            .provider
            .raw_request(GET_BLOCK_BY_NUMBER.into(), (BlockNumberOrTag::Latest, false))
            .await
            .inspect_err(|e| warn!(%e, "Failed to fetch latest block"))?;
        block.base_fee_per_gas.ok_or(BundlerError::MissingBaseFee)
    }

    /// The bundler's priority fee suggestion.
    #[instrument(skip_all)]
    pub async fn max_priority_fee(&self) -> Result<U256> {
        self.provider
            .raw_request(MAX_PRIORITY_FEE.into(), ())
            .await
            .inspect_err(|e| warn!(%e, "Failed to fetch priority fee"))
            .map_err(Into::into)
    }

    /// The operation the bundler holds for `(sender, nonce)`, if any.
    #[instrument(skip(self))]
    pub async fn pending_operation(
        &self,
        sender: Address,
        nonce: U256,
    ) -> Result<Option<UserOperation>> {
        let pending: Option<UserOperation> = self
            .provider
            .raw_request(PENDING_BY_SENDER_NONCE.into(), (sender, nonce))
            .await
            .inspect_err(|e| warn!(%e, "Failed to fetch pending operation"))?;
        debug!(found = pending.is_some(), "pending operation lookup");
        Ok(pending)
    }

    /// Estimate the gas limits of an operation.
    #[instrument(skip_all, fields(sender = %op.sender(), nonce = %op.nonce()))]
    pub async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate> {
        self.provider
            .raw_request(ESTIMATE_GAS.into(), (op.clone(), self.entry_point.address()))
            .await
            .inspect_err(|e| warn!(%e, "Failed to estimate operation gas"))
            .map_err(Into::into)
    }

    /// Submit a signed operation. Returns its hash.
    #[instrument(skip_all, fields(sender = %op.sender(), nonce = %op.nonce()))]
    pub async fn send_operation(&self, op: &UserOperation) -> Result<B256> {
        let hash: B256 = self
            .provider
            .raw_request(SEND_OPERATION.into(), (op.clone(), self.entry_point.address()))
            .await
            .inspect_err(|e| warn!(%e, "Failed to send operation"))?;
        debug!(%hash, "operation submitted");
        Ok(hash)
    }

    /// The receipt of a submitted operation, or `None` while pending.
    #[instrument(skip(self))]
    pub async fn operation_receipt(&self, hash: B256) -> Result<Option<UserOperationReceipt>> {
        self.provider
            .raw_request(GET_RECEIPT.into(), (hash,))
            .await
            .inspect_err(|e| warn!(%e, "Failed to fetch operation receipt"))
            .map_err(Into::into)
    }

    /// Ask the paymaster to sponsor an operation.
    #[instrument(skip_all, fields(policy = %request.policy_id))]
    pub async fn request_sponsorship(
        &self,
        request: &SponsorshipRequest,
    ) -> Result<SponsorshipResponse> {
        let raw: RawSponsorshipResponse = self
            .provider
            .raw_request(REQUEST_SPONSORSHIP.into(), (request.clone(),))
            .await
            .inspect_err(|e| warn!(%e, "Failed to request sponsorship"))?;
        raw.into_response(request.version())
            .inspect_err(|e| warn!(%e, "Unusable sponsorship response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::{
        primitives::{b256, Bytes, U64},
        providers::ProviderBuilder,
        transports::mock::Asserter,
    };
    use serde_json::json;
    use userop_constants::{EntryPointVersion, DEFAULT_STUB_SIGNATURE};
    use userop_types::{PendingOperation, ReceiptInfo, Sponsorship};

    fn client() -> (BundlerClient<impl Provider>, Asserter) {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new().connect_mocked_client(asserter.clone());
        (BundlerClient::new(provider, EntryPoint::v07()), asserter)
    }

    fn op() -> UserOperation {
        PendingOperation::new(
            EntryPointVersion::V07,
            Address::repeat_byte(0xac),
            U256::from(1),
            Bytes::new(),
        )
        .to_placeholder()
        .unwrap()
    }

    #[test]
    fn http_constructors() {
        let url: url::Url = "http://localhost:3000".parse().unwrap();
        let client = BundlerClient::new_with_client(url, Client::new(), EntryPoint::v06());
        assert_eq!(client.entry_point(), EntryPoint::v06());

        let config = ClientConfig {
            bundler_rpc_url: "not a url".into(),
            chain_id: 1,
            entry_point: EntryPoint::v07(),
            policy: None,
            receipt_poll_interval_ms: 1,
            receipt_max_attempts: 1,
        };
        assert!(matches!(BundlerClient::from_config(&config), Err(BundlerError::Url(_))));
    }

    #[tokio::test]
    async fn base_fee_reads_latest_block() {
        let (client, asserter) = client();
        asserter.push_success(&json!({ "number": "0x10", "baseFeePerGas": "0x3b9aca00" }));
        assert_eq!(client.base_fee().await.unwrap(), U256::from(1_000_000_000u64));

        asserter.push_success(&json!({ "number": "0x10" }));
        assert!(matches!(client.base_fee().await, Err(BundlerError::MissingBaseFee)));
    }

    #[tokio::test]
    async fn fee_and_pending_lookups() {
        let (client, asserter) = client();
        asserter.push_success(&U256::from(7));
        asserter.push_success(&serde_json::Value::Null);
        asserter.push_success(&op());

        assert_eq!(client.max_priority_fee().await.unwrap(), U256::from(7));
        assert_eq!(client.pending_operation(Address::ZERO, U256::ZERO).await.unwrap(), None);
        assert_eq!(
            client.pending_operation(Address::ZERO, U256::ZERO).await.unwrap(),
            Some(op())
        );
    }

    #[tokio::test]
    async fn send_and_receipt() {
        let (client, asserter) = client();
        let hash = b256!("0x4b2c7dbab2a8a9b1b5e0e8c2d94b8ac5e5a7f1d9d2b6d8b1f7c3a2e9c1d4b6a8");
        asserter.push_success(&hash);
        asserter.push_success(&serde_json::Value::Null);

        let receipt = UserOperationReceipt {
            user_op_hash: hash,
            entry_point: EntryPoint::v07().address(),
            sender: Address::repeat_byte(0xac),
            nonce: U256::from(1),
            paymaster: None,
            actual_gas_cost: U256::from(1),
            actual_gas_used: U256::from(1),
            success: true,
            reason: None,
            receipt: ReceiptInfo {
                transaction_hash: B256::repeat_byte(1),
                block_hash: B256::repeat_byte(2),
                block_number: U64::from(3),
            },
        };
        asserter.push_success(&receipt);

        assert_eq!(client.send_operation(&op()).await.unwrap(), hash);
        assert_eq!(client.operation_receipt(hash).await.unwrap(), None);
        assert_eq!(client.operation_receipt(hash).await.unwrap(), Some(receipt));
    }

    #[tokio::test]
    async fn sponsorship_round_trip() {
        let (client, asserter) = client();
        asserter.push_success(&json!({
            "paymaster": "0x9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a9a",
            "paymasterData": "0x",
            "paymasterVerificationGasLimit": "0x1000",
            "paymasterPostOpGasLimit": "0x10"
        }));
        asserter.push_success(&json!({}));

        let request = SponsorshipRequest {
            policy_id: "policy".into(),
            entry_point: EntryPoint::v07().address(),
            user_operation: op(),
            dummy_signature: DEFAULT_STUB_SIGNATURE,
            overrides: None,
        };
        let response = client.request_sponsorship(&request).await.unwrap();
        assert!(response.sponsorship.is_sponsored());
        assert_eq!(response.gas, None);
        let Sponsorship::V07(Some(data)) = response.sponsorship else {
            panic!("expected v0.7 sponsorship");
        };
        assert_eq!(data.paymaster_verification_gas_limit, U256::from(0x1000));

        assert!(matches!(
            client.request_sponsorship(&request).await,
            Err(BundlerError::MissingPaymaster(EntryPointVersion::V07))
        ));
    }

    #[tokio::test]
    async fn transport_errors_surface() {
        let (client, asserter) = client();
        asserter.push_failure_msg("AA25 invalid account nonce");
        let err = client.send_operation(&op()).await.unwrap_err();
        assert!(matches!(err, BundlerError::Transport(_)));
        assert!(err.to_string().contains("AA25"));
    }
}
