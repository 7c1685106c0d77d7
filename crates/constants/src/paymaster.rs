use alloy::primitives::{bytes, Bytes};

/// Verification gas reserved for a v0.7 paymaster when the sponsorship
/// response does not specify one.
pub const DEFAULT_PAYMASTER_VERIFICATION_GAS_LIMIT: u64 = 100_000;

/// Post-op gas reserved for a v0.7 paymaster when the sponsorship response
/// does not specify one.
pub const DEFAULT_PAYMASTER_POST_OP_GAS_LIMIT: u64 = 50_000;

/// Placeholder ECDSA signature used while an operation is estimated and
/// sponsored.
///
/// It has the exact length of a real 65-byte signature and recovers to a
/// valid (random) address, so account validation code follows the same path
/// it would for a real signature.
pub const DEFAULT_STUB_SIGNATURE: Bytes = bytes!(
    "fffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c"
);
