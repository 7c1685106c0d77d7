//! Mocks and helpers for testing user operation pipelines without a
//! bundler or chain.

mod accounts;
pub use accounts::{encode_simple_account_calls, MockAccount, MockMultisigAccount, SimpleAccount};

mod bundler;
pub use bundler::{MockBundler, MockBundlerError, MOCK_BASE_FEE, MOCK_PRIORITY_FEE};

mod paymaster;
pub use paymaster::{MockPaymaster, MOCK_PAYMASTER_DATA};

mod signer;
pub use signer::MockContractSigner;

mod verify;
pub use verify::{AcceptAll, EoaVerifier, OperationVerifier, ThresholdVerifier};

pub use userop_constants::test_utils as test_constants;
pub use userop_types::test_utils as users;

/// Install a `tracing` subscriber that writes to the test output, filtered
/// by `RUST_LOG`. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
