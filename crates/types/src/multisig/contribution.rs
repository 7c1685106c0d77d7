use alloy::primitives::{Address, Bytes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How an owner's signature is verified on-chain.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignerKind {
    /// An ECDSA signature from an externally owned account.
    Eoa,
    /// An ERC-1271 signature checked by calling the signer contract.
    Contract,
}

/// Which gas values a signature commits to.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GasCommitment {
    /// The operation hash with `preVerificationGas` and both fees replaced
    /// by the agreed upper limits. Later signers may lower those values.
    #[default]
    #[serde(alias = "UPPERLIMIT")]
    UpperBound,
    /// The exact operation hash. Later signers must reuse the same struct.
    Actual,
}

impl GasCommitment {
    /// The amount added to the `v` byte of a signature slot.
    pub const fn v_offset(&self) -> u8 {
        match self {
            Self::UpperBound => 0,
            Self::Actual => 32,
        }
    }
}

impl fmt::Display for GasCommitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpperBound => f.write_str("upper-bound"),
            Self::Actual => f.write_str("actual"),
        }
    }
}

/// One owner's signature over a multisig operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignerContribution {
    /// The owner.
    pub signer: Address,
    /// The signature bytes. For EOAs, `r ‖ s ‖ v` with `v` of 27 or 28.
    pub signature: Bytes,
    /// How the signature is verified.
    pub kind: SignerKind,
    /// What the signature commits to.
    pub commitment: GasCommitment,
}

impl SignerContribution {
    /// An EOA contribution.
    pub const fn eoa(signer: Address, signature: Bytes, commitment: GasCommitment) -> Self {
        Self { signer, signature, kind: SignerKind::Eoa, commitment }
    }

    /// A contract contribution.
    pub const fn contract(signer: Address, signature: Bytes, commitment: GasCommitment) -> Self {
        Self { signer, signature, kind: SignerKind::Contract, commitment }
    }
}
