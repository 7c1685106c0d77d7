use crate::{Bundler, Paymaster};
use alloy::{
    primitives::{Address, B256, U256},
    providers::Provider,
};
use userop_bundler::{BundlerClient, BundlerError, SponsorshipRequest, SponsorshipResponse};
use userop_types::{GasEstimate, UserOperation, UserOperationReceipt};

impl<P: Provider> Bundler for BundlerClient<P> {
    type Error = BundlerError;

    async fn base_fee(&self) -> Result<U256, Self::Error> {
        BundlerClient::base_fee(self).await
    }

    async fn max_priority_fee(&self) -> Result<U256, Self::Error> {
        BundlerClient::max_priority_fee(self).await
    }

    async fn pending_operation(
        &self,
        sender: Address,
        nonce: U256,
    ) -> Result<Option<UserOperation>, Self::Error> {
        BundlerClient::pending_operation(self, sender, nonce).await
    }

    async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate, Self::Error> {
        BundlerClient::estimate_gas(self, op).await
    }

    async fn send_operation(&self, op: &UserOperation) -> Result<B256, Self::Error> {
        BundlerClient::send_operation(self, op).await
    }

    async fn operation_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<UserOperationReceipt>, Self::Error> {
        BundlerClient::operation_receipt(self, hash).await
    }
}

impl<P: Provider> Paymaster for BundlerClient<P> {
    type Error = BundlerError;

    async fn request_sponsorship(
        &self,
        request: &SponsorshipRequest,
    ) -> Result<SponsorshipResponse, Self::Error> {
        BundlerClient::request_sponsorship(self, request).await
    }
}
