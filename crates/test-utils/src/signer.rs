//! A mock ERC-1271 owner.

use alloy::primitives::{keccak256, Address, Bytes};
use core::convert::Infallible;
use userop_client::OperationSigner;
use userop_types::multisig::SignerKind;

/// A contract owner whose "signature" is `keccak256(address ‖ message)`.
///
/// [`ThresholdVerifier`] accepts exactly that value, standing in for the
/// owner contract's `isValidSignature`.
///
/// [`ThresholdVerifier`]: crate::ThresholdVerifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockContractSigner {
    address: Address,
}

impl MockContractSigner {
    /// Create a contract owner at `address`.
    pub const fn new(address: Address) -> Self {
        Self { address }
    }

    /// The signature the contract at `address` accepts for `message`.
    pub fn signature_for(address: Address, message: &[u8]) -> Bytes {
        Bytes::copy_from_slice(keccak256([address.as_slice(), message].concat()).as_slice())
    }
}

impl OperationSigner for MockContractSigner {
    type Error = Infallible;

    fn address(&self) -> Address {
        self.address
    }

    fn kind(&self) -> SignerKind {
        SignerKind::Contract
    }

    fn stub_signature(&self) -> Bytes {
        Bytes::from(vec![0xff; 32])
    }

    async fn sign_bytes(&self, message: &[u8]) -> Result<Bytes, Self::Error> {
        Ok(Self::signature_for(self.address, message))
    }
}
