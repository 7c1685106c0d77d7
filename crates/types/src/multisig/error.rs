use super::GasCommitment;
use alloy::primitives::{Address, U256};

/// An error that can occur when aggregating or splitting multisig signatures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AggregationError {
    /// No contributions were supplied.
    #[error("cannot aggregate zero signatures")]
    Empty,
    /// Contributions commit to different gas values.
    #[error("mixed commitment modes: expected {expected}, found {found} from {signer}")]
    MixedCommitments {
        /// The mode of the first contribution.
        expected: GasCommitment,
        /// The offending mode.
        found: GasCommitment,
        /// The offending signer.
        signer: Address,
    },
    /// An EOA signature was not 65 bytes of `r ‖ s ‖ v`.
    #[error("EOA signature from {signer} is malformed")]
    MalformedEoaSignature {
        /// The signer.
        signer: Address,
    },
    /// The blob is shorter than its declared contents.
    #[error("aggregated signature truncated: needed {needed} bytes, had {len}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        len: usize,
    },
    /// A slot carries a `v` byte that is neither an EOA nor a contract marker.
    #[error("signature slot {index} has unknown v byte {v}")]
    UnknownSlot {
        /// The slot index.
        index: usize,
        /// The v byte.
        v: u8,
    },
    /// A contract slot points at data outside the blob.
    #[error("contract signature offset {offset} in slot {index} is out of bounds")]
    BadOffset {
        /// The slot index.
        index: usize,
        /// The offset.
        offset: U256,
    },
    /// An EOA signer could not be recovered.
    #[error("failed to recover signer of slot {index}")]
    Recovery {
        /// The slot index.
        index: usize,
    },
    /// The operation's gas values exceed the agreed upper limits.
    #[error("{field} {actual} exceeds upper limit {limit}")]
    ExceedsLimit {
        /// The field name.
        field: &'static str,
        /// The operation's value.
        actual: U256,
        /// The upper limit.
        limit: U256,
    },
}
