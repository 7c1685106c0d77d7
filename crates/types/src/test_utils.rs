use crate::{FeeEstimate, GasEstimate, PendingOperation, UserOperation};
use alloy::{
    primitives::{Address, Bytes, U256},
    signers::{k256::ecdsa::SigningKey, local::PrivateKeySigner},
};
use std::sync::LazyLock;
use userop_constants::{test_utils::TEST_ACCOUNT, EntryPointVersion};

/// Test signers used in tests.
pub static TEST_SIGNERS: LazyLock<[PrivateKeySigner; 10]> = LazyLock::new(|| {
    [
        PrivateKeySigner::from(SigningKey::from_slice(&[1u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[2u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[3u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[4u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[5u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[6u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[7u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[8u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[9u8; 32]).unwrap()),
        PrivateKeySigner::from(SigningKey::from_slice(&[10u8; 32]).unwrap()),
    ]
});

/// Test users used in tests. Addresses corresponding to [`TEST_SIGNERS`].
pub static TEST_USERS: LazyLock<[Address; 10]> =
    LazyLock::new(|| TEST_SIGNERS.each_ref().map(|s| s.address()));

/// Gas limits used when a test does not care about estimation.
pub const TEST_GAS: GasEstimate = GasEstimate::new(
    U256::from_limbs([50_000, 0, 0, 0]),
    U256::from_limbs([100_000, 0, 0, 0]),
    U256::from_limbs([21_000, 0, 0, 0]),
);

/// Fees used when a test does not care about fee resolution.
pub const TEST_FEES: FeeEstimate = FeeEstimate::new(
    U256::from_limbs([3_000_000_000, 0, 0, 0]),
    U256::from_limbs([1_000_000_000, 0, 0, 0]),
);

/// A resolved, unsponsored, unsigned operation from [`TEST_ACCOUNT`].
pub fn test_operation(version: EntryPointVersion, nonce: u64, call_data: Bytes) -> UserOperation {
    let mut op = PendingOperation::new(version, TEST_ACCOUNT, U256::from(nonce), call_data);
    op.set_gas(&TEST_GAS);
    op.set_fees(TEST_FEES);
    op.resolve().unwrap()
}
