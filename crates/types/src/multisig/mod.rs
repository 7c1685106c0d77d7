mod aggregate;
pub use aggregate::{AggregatedSignature, SignatureSlot, SplitSignature};

mod contribution;
pub use contribution::{GasCommitment, SignerContribution, SignerKind};

mod error;
pub use error::AggregationError;

mod limits;
pub use limits::UpperLimits;

mod proposal;
pub use proposal::MultisigProposal;
