//! A mock bundler that keeps submitted operations in memory.

use crate::{AcceptAll, OperationVerifier};
use alloy::primitives::{Address, B256, U256, U64};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::debug;
use userop_client::{fee::replacement_floor, Bundler};
use userop_constants::{test_utils::TEST_CHAIN_ID, EntryPoint};
use userop_types::{
    test_utils::TEST_GAS, FeeEstimate, GasEstimate, ReceiptInfo, UserOperation,
    UserOperationReceipt,
};

/// Base fee returned by a fresh [`MockBundler`]: 10 gwei.
pub const MOCK_BASE_FEE: U256 = U256::from_limbs([10_000_000_000, 0, 0, 0]);

/// Priority fee returned by a fresh [`MockBundler`]: 1 gwei.
pub const MOCK_PRIORITY_FEE: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// Errors returned by [`MockBundler`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockBundlerError {
    /// A replacement did not beat the held operation's fees by 10%.
    #[error("replacement underpriced: needs {needed:?}, got {offered:?}")]
    ReplacementUnderpriced {
        /// The lowest acceptable fees.
        needed: FeeEstimate,
        /// The replacement's fees.
        offered: FeeEstimate,
    },
}

#[derive(Debug, Default)]
struct BundlerState {
    base_fee: U256,
    priority_fee: U256,
    gas: GasEstimate,
    pending: HashMap<(Address, U256), UserOperation>,
    sent: Vec<UserOperation>,
    estimated: Vec<UserOperation>,
    fee_requests: usize,
    receipts: HashMap<B256, UserOperationReceipt>,
    receipt_delay: u32,
    polls: HashMap<B256, u32>,
}

/// A mock [`Bundler`].
///
/// Submitted operations are held by `(sender, nonce)` until replaced, and a
/// receipt is produced for each one using the configured
/// [`OperationVerifier`]. Receipts can be held back for a number of polls.
#[derive(Debug, Clone)]
pub struct MockBundler<V = AcceptAll> {
    state: Arc<Mutex<BundlerState>>,
    verifier: V,
    entry_point: EntryPoint,
    chain_id: u64,
}

impl MockBundler {
    /// Create a bundler that accepts every operation.
    pub fn new(entry_point: EntryPoint) -> Self {
        Self::with_verifier(entry_point, AcceptAll)
    }
}

impl<V> MockBundler<V> {
    /// Create a bundler that validates operations with `verifier`.
    pub fn with_verifier(entry_point: EntryPoint, verifier: V) -> Self {
        let state = BundlerState {
            base_fee: MOCK_BASE_FEE,
            priority_fee: MOCK_PRIORITY_FEE,
            gas: TEST_GAS,
            ..Default::default()
        };
        Self { state: Arc::new(Mutex::new(state)), verifier, entry_point, chain_id: TEST_CHAIN_ID }
    }

    /// Set the fees returned by the fee RPCs.
    pub fn set_fees(&self, base_fee: U256, priority_fee: U256) {
        let mut state = self.state.lock().unwrap();
        state.base_fee = base_fee;
        state.priority_fee = priority_fee;
    }

    /// Set the gas estimate returned for every operation.
    pub fn set_gas(&self, gas: GasEstimate) {
        self.state.lock().unwrap().gas = gas;
    }

    /// Return `None` for the first `polls` receipt requests of each
    /// operation.
    pub fn delay_receipts(&self, polls: u32) {
        self.state.lock().unwrap().receipt_delay = polls;
    }

    /// Every operation submitted, in order.
    pub fn sent_operations(&self) -> Vec<UserOperation> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Every operation sent for estimation, in order.
    pub fn estimated_operations(&self) -> Vec<UserOperation> {
        self.state.lock().unwrap().estimated.clone()
    }

    /// The number of base fee and priority fee requests.
    pub fn fee_requests(&self) -> usize {
        self.state.lock().unwrap().fee_requests
    }

    /// The operation held for `(sender, nonce)`.
    pub fn held(&self, sender: Address, nonce: U256) -> Option<UserOperation> {
        self.state.lock().unwrap().pending.get(&(sender, nonce)).cloned()
    }
}

impl<V: OperationVerifier> MockBundler<V> {
    fn receipt(&self, op: &UserOperation, hash: B256) -> UserOperationReceipt {
        let outcome = self.verifier.verify(op, self.entry_point.address(), self.chain_id);
        let gas_used =
            op.call_gas_limit() + op.verification_gas_limit() + op.pre_verification_gas();
        UserOperationReceipt {
            user_op_hash: hash,
            entry_point: self.entry_point.address(),
            sender: op.sender(),
            nonce: op.nonce(),
            paymaster: op.sponsorship().paymaster(),
            actual_gas_cost: gas_used * op.max_fee_per_gas(),
            actual_gas_used: gas_used,
            success: outcome.is_ok(),
            reason: outcome.err(),
            receipt: ReceiptInfo {
                transaction_hash: B256::with_last_byte(0x11),
                block_hash: B256::with_last_byte(0x22),
                block_number: U64::from(1),
            },
        }
    }
}

impl<V> Bundler for MockBundler<V>
where
    V: OperationVerifier + Send + Sync,
{
    type Error = MockBundlerError;

    async fn base_fee(&self) -> Result<U256, Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.fee_requests += 1;
        Ok(state.base_fee)
    }

    async fn max_priority_fee(&self) -> Result<U256, Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.fee_requests += 1;
        Ok(state.priority_fee)
    }

    async fn pending_operation(
        &self,
        sender: Address,
        nonce: U256,
    ) -> Result<Option<UserOperation>, Self::Error> {
        Ok(self.held(sender, nonce))
    }

    async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate, Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.estimated.push(op.clone());
        Ok(state.gas)
    }

    async fn send_operation(&self, op: &UserOperation) -> Result<B256, Self::Error> {
        let hash = op.hash(self.entry_point.address(), self.chain_id);
        let receipt = self.receipt(op, hash);

        let mut state = self.state.lock().unwrap();
        let key = (op.sender(), op.nonce());
        if let Some(held) = state.pending.get(&key) {
            let needed = replacement_floor(held.fees()).unwrap_or(held.fees());
            let offered = op.fees();
            if offered.max_fee_per_gas < needed.max_fee_per_gas
                || offered.max_priority_fee_per_gas < needed.max_priority_fee_per_gas
            {
                return Err(MockBundlerError::ReplacementUnderpriced { needed, offered });
            }
            debug!(%hash, "replacing held operation");
        }

        state.pending.insert(key, op.clone());
        state.sent.push(op.clone());
        state.receipts.insert(hash, receipt);
        Ok(hash)
    }

    async fn operation_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<UserOperationReceipt>, Self::Error> {
        let mut state = self.state.lock().unwrap();
        let delay = state.receipt_delay;
        let polls = state.polls.entry(hash).or_default();
        *polls += 1;
        if *polls <= delay {
            return Ok(None);
        }
        Ok(state.receipts.get(&hash).cloned())
    }
}
