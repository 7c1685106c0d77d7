//! Mock smart accounts.

use alloy::{
    primitives::{Address, Bytes, U256},
    sol_types::SolCall,
};
use core::convert::Infallible;
use std::sync::{Arc, Mutex};
use userop_client::{MultisigAccount, SmartAccount};
use userop_constants::{
    test_utils::{TEST_ACCOUNT, TEST_FACTORY},
    EntryPoint,
};
use userop_types::{Call, InitCode};

alloy::sol! {
    /// Execution and factory entry points of a simple smart account.
    #[derive(Debug)]
    interface SimpleAccount {
        function execute(address dest, uint256 value, bytes calldata func) external;
        function executeBatch(
            address[] calldata dest,
            uint256[] calldata value,
            bytes[] calldata func
        ) external;
        function createAccount(address owner, uint256 salt) external returns (address);
    }
}

/// Encode calls the way [`SimpleAccount`] executes them. One call uses
/// `execute`, more use `executeBatch`.
pub fn encode_simple_account_calls(calls: &[Call]) -> Bytes {
    match calls {
        [call] => SimpleAccount::executeCall {
            dest: call.target,
            value: call.value,
            func: call.data.clone(),
        }
        .abi_encode()
        .into(),
        _ => SimpleAccount::executeBatchCall {
            dest: calls.iter().map(|c| c.target).collect(),
            value: calls.iter().map(|c| c.value).collect(),
            func: calls.iter().map(|c| c.data.clone()).collect(),
        }
        .abi_encode()
        .into(),
    }
}

/// A mock [`SmartAccount`] at [`TEST_ACCOUNT`].
///
/// The account is deployed and its factory agrees on its address unless
/// configured otherwise.
#[derive(Debug, Clone)]
pub struct MockAccount {
    address: Address,
    derived: Address,
    owner: Address,
    entry_point: EntryPoint,
    deployed: bool,
    nonce: Arc<Mutex<U256>>,
}

impl MockAccount {
    /// Create a deployed account owned by `owner`.
    pub fn new(entry_point: EntryPoint, owner: Address) -> Self {
        Self {
            address: TEST_ACCOUNT,
            derived: TEST_ACCOUNT,
            owner,
            entry_point,
            deployed: true,
            nonce: Arc::default(),
        }
    }

    /// Mark the account as not yet deployed, so operations carry init code.
    pub const fn counterfactual(mut self) -> Self {
        self.deployed = false;
        self
    }

    /// Make the factory derive a different address than the account's own.
    pub const fn with_derived_address(mut self, derived: Address) -> Self {
        self.derived = derived;
        self
    }

    /// Set the next nonce.
    pub fn set_nonce(&self, nonce: U256) {
        *self.nonce.lock().unwrap() = nonce;
    }

    /// The init code sent while the account is counterfactual.
    pub fn deployment(&self) -> InitCode {
        InitCode {
            factory: TEST_FACTORY,
            factory_data: SimpleAccount::createAccountCall { owner: self.owner, salt: U256::ZERO }
                .abi_encode()
                .into(),
        }
    }
}

impl SmartAccount for MockAccount {
    type Error = Infallible;

    fn address(&self) -> Address {
        self.address
    }

    fn entry_point(&self) -> EntryPoint {
        self.entry_point
    }

    async fn derived_address(&self) -> Result<Address, Self::Error> {
        Ok(self.derived)
    }

    async fn init_code(&self) -> Result<Option<InitCode>, Self::Error> {
        Ok((!self.deployed).then(|| self.deployment()))
    }

    async fn nonce(&self) -> Result<U256, Self::Error> {
        Ok(*self.nonce.lock().unwrap())
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes, Self::Error> {
        Ok(encode_simple_account_calls(calls))
    }
}

/// A mock [`MultisigAccount`]: a [`MockAccount`] with a set of owners and
/// a signature threshold.
#[derive(Debug, Clone)]
pub struct MockMultisigAccount {
    account: MockAccount,
    owners: Vec<Address>,
    threshold: usize,
}

impl MockMultisigAccount {
    /// Create a deployed `threshold`-of-`owners` account.
    pub fn new(entry_point: EntryPoint, owners: Vec<Address>, threshold: usize) -> Self {
        let first = owners.first().copied().unwrap_or_default();
        Self { account: MockAccount::new(entry_point, first), owners, threshold }
    }

    /// Get the underlying account.
    pub const fn account(&self) -> &MockAccount {
        &self.account
    }
}

impl SmartAccount for MockMultisigAccount {
    type Error = Infallible;

    fn address(&self) -> Address {
        self.account.address()
    }

    fn entry_point(&self) -> EntryPoint {
        self.account.entry_point()
    }

    async fn derived_address(&self) -> Result<Address, Self::Error> {
        self.account.derived_address().await
    }

    async fn init_code(&self) -> Result<Option<InitCode>, Self::Error> {
        self.account.init_code().await
    }

    async fn nonce(&self) -> Result<U256, Self::Error> {
        self.account.nonce().await
    }

    fn encode_calls(&self, calls: &[Call]) -> Result<Bytes, Self::Error> {
        self.account.encode_calls(calls)
    }
}

impl MultisigAccount for MockMultisigAccount {
    async fn owners(&self) -> Result<Vec<Address>, Self::Error> {
        Ok(self.owners.clone())
    }

    async fn threshold(&self) -> Result<usize, Self::Error> {
        Ok(self.threshold)
    }
}
