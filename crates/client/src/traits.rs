use alloy::{
    primitives::{Address, Bytes, B256, U256},
    signers::Signer,
};
use core::future::Future;
use userop_bundler::{SponsorshipRequest, SponsorshipResponse};
use userop_constants::{EntryPoint, DEFAULT_STUB_SIGNATURE};
use userop_types::{
    multisig::SignerKind, Call, GasEstimate, InitCode, UserOperation, UserOperationReceipt,
};

/// A trait for the bundler an operation is estimated against and submitted
/// to.
///
/// Implementors forward each call to an ERC-4337 bundler, typically over
/// JSON-RPC.
pub trait Bundler {
    /// The error type returned by bundler calls.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Base fee of the latest block.
    fn base_fee(&self) -> impl Future<Output = Result<U256, Self::Error>> + Send;

    /// The bundler's priority fee suggestion.
    fn max_priority_fee(&self) -> impl Future<Output = Result<U256, Self::Error>> + Send;

    /// The operation currently held for `(sender, nonce)`, if any.
    fn pending_operation(
        &self,
        sender: Address,
        nonce: U256,
    ) -> impl Future<Output = Result<Option<UserOperation>, Self::Error>> + Send;

    /// Estimate the gas limits of an operation.
    fn estimate_gas(
        &self,
        op: &UserOperation,
    ) -> impl Future<Output = Result<GasEstimate, Self::Error>> + Send;

    /// Submit a signed operation, returning its hash.
    fn send_operation(
        &self,
        op: &UserOperation,
    ) -> impl Future<Output = Result<B256, Self::Error>> + Send;

    /// The receipt of a submitted operation, or `None` while it is pending.
    fn operation_receipt(
        &self,
        hash: B256,
    ) -> impl Future<Output = Result<Option<UserOperationReceipt>, Self::Error>> + Send;
}

/// A trait for a paymaster that sponsors operations under a gas policy.
pub trait Paymaster {
    /// The error type returned by sponsorship requests.
    type Error: core::error::Error + Send + Sync + 'static;

    /// Request sponsorship for an operation.
    fn request_sponsorship(
        &self,
        request: &SponsorshipRequest,
    ) -> impl Future<Output = Result<SponsorshipResponse, Self::Error>> + Send;
}

/// A trait for the key that authorizes operations.
///
/// Every [`Signer`] is an EOA operation signer that signs with EIP-191.
/// Contract owners implement this directly and return
/// [`SignerKind::Contract`].
pub trait OperationSigner {
    /// The error type returned by signing.
    type Error: core::error::Error + Send + Sync + 'static;

    /// The signer's address.
    fn address(&self) -> Address;

    /// How the signer's signatures are verified.
    fn kind(&self) -> SignerKind {
        SignerKind::Eoa
    }

    /// A placeholder with the length of a real signature, used while the
    /// operation is estimated and sponsored.
    fn stub_signature(&self) -> Bytes {
        DEFAULT_STUB_SIGNATURE
    }

    /// Sign `message`.
    fn sign_bytes(&self, message: &[u8])
        -> impl Future<Output = Result<Bytes, Self::Error>> + Send;
}

impl<S> OperationSigner for S
where
    S: Signer + Send + Sync,
{
    type Error = alloy::signers::Error;

    fn address(&self) -> Address {
        Signer::address(self)
    }

    async fn sign_bytes(&self, message: &[u8]) -> Result<Bytes, Self::Error> {
        let signature = self.sign_message(message).await?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

/// A trait for the smart account operations are sent from.
pub trait SmartAccount {
    /// The error type returned by account queries.
    type Error: core::error::Error + Send + Sync + 'static;

    /// The account address.
    fn address(&self) -> Address;

    /// The entry point the account validates operations through.
    fn entry_point(&self) -> EntryPoint;

    /// The counterfactual address the account's factory derives for it.
    fn derived_address(&self) -> impl Future<Output = Result<Address, Self::Error>> + Send;

    /// Deployment data, or `None` once the account is deployed.
    fn init_code(&self) -> impl Future<Output = Result<Option<InitCode>, Self::Error>> + Send;

    /// The next nonce.
    fn nonce(&self) -> impl Future<Output = Result<U256, Self::Error>> + Send;

    /// Encode calls into the account's execution calldata.
    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes, Self::Error>;
}

/// A trait for smart accounts validated by a threshold of owner signatures.
pub trait MultisigAccount: SmartAccount {
    /// The account owners.
    fn owners(&self) -> impl Future<Output = Result<Vec<Address>, Self::Error>> + Send;

    /// The number of owner signatures required.
    fn threshold(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send;
}
