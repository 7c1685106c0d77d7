use crate::{
    FeeEstimate, GasEstimate, OperationError, OperationFingerprint, PaymasterData, Sponsorship,
    UserOperation, UserOperationV06, UserOperationV07,
};
use alloy::primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};
use userop_constants::EntryPointVersion;

/// A single call executed by the account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Call {
    /// The call target.
    pub target: Address,
    /// Wei sent with the call.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
}

impl Call {
    /// Create a new call.
    pub const fn new(target: Address, value: U256, data: Bytes) -> Self {
        Self { target, value, data }
    }

    /// A zero-value call with empty calldata.
    pub const fn empty(target: Address) -> Self {
        Self::new(target, U256::ZERO, Bytes::new())
    }
}

/// Factory and factory calldata that deploy an account on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitCode {
    /// The factory contract.
    pub factory: Address,
    /// Calldata for the factory.
    pub factory_data: Bytes,
}

impl InitCode {
    /// `factory ‖ factoryData`, the v0.6 `initCode` form.
    pub fn to_bytes(&self) -> Bytes {
        [self.factory.as_slice(), self.factory_data.as_ref()].concat().into()
    }

    /// Split a v0.6 `initCode` blob. Returns `None` for an empty or
    /// truncated blob.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 20 {
            return None;
        }
        let (factory, data) = bytes.split_at(20);
        Some(Self { factory: Address::from_slice(factory), factory_data: data.to_vec().into() })
    }
}

/// An operation under construction.
///
/// The pipeline fills gas, fee, sponsorship and signature fields one stage
/// at a time. The entry point version is fixed at creation and decides the
/// shape of the [`UserOperation`] this resolves into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOperation {
    version: EntryPointVersion,
    /// The account sending the operation.
    pub sender: Address,
    /// Anti-replay nonce.
    pub nonce: U256,
    /// The calldata the account executes.
    pub call_data: Bytes,
    /// Deployment data, present only before the account is deployed.
    pub init_code: Option<InitCode>,
    /// Gas for the main execution call.
    pub call_gas_limit: Option<U256>,
    /// Gas for the validation phase.
    pub verification_gas_limit: Option<U256>,
    /// Gas paid to the bundler for unmetered overhead.
    pub pre_verification_gas: Option<U256>,
    /// EIP-1559 max fee.
    pub max_fee_per_gas: Option<U256>,
    /// EIP-1559 priority fee.
    pub max_priority_fee_per_gas: Option<U256>,
    sponsorship: Option<Sponsorship>,
    /// The account signature, or a placeholder before signing.
    pub signature: Bytes,
}

impl PendingOperation {
    /// Create an operation with only its identity fields set.
    pub const fn new(
        version: EntryPointVersion,
        sender: Address,
        nonce: U256,
        call_data: Bytes,
    ) -> Self {
        Self {
            version,
            sender,
            nonce,
            call_data,
            init_code: None,
            call_gas_limit: None,
            verification_gas_limit: None,
            pre_verification_gas: None,
            max_fee_per_gas: None,
            max_priority_fee_per_gas: None,
            sponsorship: None,
            signature: Bytes::new(),
        }
    }

    /// Start a new construction of `op`, keeping its identity (sender,
    /// nonce, calldata and deployment data) and nothing else.
    pub fn seeded_from(op: &UserOperation) -> Self {
        let mut pending = Self::new(op.version(), op.sender(), op.nonce(), op.call_data().clone());
        pending.init_code = op.init_code();
        pending
    }

    /// Set the deployment data.
    pub fn with_init_code(mut self, init_code: Option<InitCode>) -> Self {
        self.init_code = init_code;
        self
    }

    /// Set the signature.
    pub fn with_signature(mut self, signature: Bytes) -> Self {
        self.signature = signature;
        self
    }

    /// Get the entry point version.
    pub const fn version(&self) -> EntryPointVersion {
        self.version
    }

    /// The cache key for this operation.
    pub fn fingerprint(&self) -> OperationFingerprint {
        OperationFingerprint::new(self.sender, self.nonce, &self.call_data)
    }

    /// Get the sponsorship, if one has been attached.
    pub const fn sponsorship(&self) -> Option<&Sponsorship> {
        self.sponsorship.as_ref()
    }

    /// Attach a sponsorship. Fails if it is shaped for another entry point
    /// version.
    pub fn set_sponsorship(&mut self, sponsorship: Sponsorship) -> Result<(), OperationError> {
        if sponsorship.version() != self.version {
            return Err(OperationError::VersionMismatch {
                expected: self.version,
                actual: sponsorship.version(),
            });
        }
        self.sponsorship = Some(sponsorship);
        Ok(())
    }

    /// Set the three gas limits from an estimate.
    pub fn set_gas(&mut self, gas: &GasEstimate) {
        self.call_gas_limit = Some(gas.call_gas_limit);
        self.verification_gas_limit = Some(gas.verification_gas_limit);
        self.pre_verification_gas = Some(gas.pre_verification_gas);
    }

    /// Set both fee fields.
    pub fn set_fees(&mut self, fees: FeeEstimate) {
        self.max_fee_per_gas = Some(fees.max_fee_per_gas);
        self.max_priority_fee_per_gas = Some(fees.max_priority_fee_per_gas);
    }

    /// Both fee fields, if resolved.
    pub const fn fees(&self) -> Option<FeeEstimate> {
        match (self.max_fee_per_gas, self.max_priority_fee_per_gas) {
            (Some(max_fee_per_gas), Some(max_priority_fee_per_gas)) => {
                Some(FeeEstimate { max_fee_per_gas, max_priority_fee_per_gas })
            }
            _ => None,
        }
    }

    /// Resolve into a [`UserOperation`] with every unresolved numeric field
    /// set to zero. Used for stub sponsorship requests and gas estimation.
    pub fn to_placeholder(&self) -> Result<UserOperation, OperationError> {
        self.assemble(|value, _| Ok(value.unwrap_or_default()))
    }

    /// Resolve into a [`UserOperation`], failing on the first unresolved
    /// numeric field. An operation without sponsorship resolves as
    /// self-sponsored.
    pub fn resolve(&self) -> Result<UserOperation, OperationError> {
        self.assemble(|value, name| value.ok_or(OperationError::Unresolved(name)))
    }

    fn assemble(
        &self,
        field: impl Fn(Option<U256>, &'static str) -> Result<U256, OperationError>,
    ) -> Result<UserOperation, OperationError> {
        let call_gas_limit = field(self.call_gas_limit, "callGasLimit")?;
        let verification_gas_limit = field(self.verification_gas_limit, "verificationGasLimit")?;
        let pre_verification_gas = field(self.pre_verification_gas, "preVerificationGas")?;
        let max_fee_per_gas = field(self.max_fee_per_gas, "maxFeePerGas")?;
        let max_priority_fee_per_gas =
            field(self.max_priority_fee_per_gas, "maxPriorityFeePerGas")?;

        let sponsorship = self.sponsorship.clone().unwrap_or(Sponsorship::none(self.version));

        match (self.version, sponsorship) {
            (EntryPointVersion::V06, Sponsorship::V06 { paymaster_and_data }) => {
                Ok(UserOperation::V06(UserOperationV06 {
                    sender: self.sender,
                    nonce: self.nonce,
                    init_code: self.init_code.as_ref().map(InitCode::to_bytes).unwrap_or_default(),
                    call_data: self.call_data.clone(),
                    call_gas_limit,
                    verification_gas_limit,
                    pre_verification_gas,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    paymaster_and_data,
                    signature: self.signature.clone(),
                }))
            }
            (EntryPointVersion::V07, Sponsorship::V07(paymaster)) => {
                let (factory, factory_data) = match &self.init_code {
                    Some(init) => (Some(init.factory), Some(init.factory_data.clone())),
                    None => (None, None),
                };
                let PaymasterParts { paymaster, data, verification, post_op } =
                    PaymasterParts::from(paymaster);
                [
                    ("callGasLimit", Some(call_gas_limit)),
                    ("verificationGasLimit", Some(verification_gas_limit)),
                    ("maxFeePerGas", Some(max_fee_per_gas)),
                    ("maxPriorityFeePerGas", Some(max_priority_fee_per_gas)),
                    ("paymasterVerificationGasLimit", verification),
                    ("paymasterPostOpGasLimit", post_op),
                ]
                .into_iter()
                .try_for_each(|(field, value)| match value {
                    Some(value) if value > U256::from(u128::MAX) => {
                        Err(OperationError::Oversized { field, value })
                    }
                    _ => Ok(()),
                })?;
                Ok(UserOperation::V07(UserOperationV07 {
                    sender: self.sender,
                    nonce: self.nonce,
                    factory,
                    factory_data,
                    call_data: self.call_data.clone(),
                    call_gas_limit,
                    verification_gas_limit,
                    pre_verification_gas,
                    max_fee_per_gas,
                    max_priority_fee_per_gas,
                    paymaster,
                    paymaster_verification_gas_limit: verification,
                    paymaster_post_op_gas_limit: post_op,
                    paymaster_data: data,
                    signature: self.signature.clone(),
                }))
            }
            (expected, sponsorship) => {
                Err(OperationError::VersionMismatch { expected, actual: sponsorship.version() })
            }
        }
    }
}

/// Optional v0.7 paymaster fields, split for struct assembly.
struct PaymasterParts {
    paymaster: Option<Address>,
    data: Option<Bytes>,
    verification: Option<U256>,
    post_op: Option<U256>,
}

impl From<Option<PaymasterData>> for PaymasterParts {
    fn from(value: Option<PaymasterData>) -> Self {
        match value {
            Some(p) => Self {
                paymaster: Some(p.paymaster),
                data: Some(p.paymaster_data),
                verification: Some(p.paymaster_verification_gas_limit),
                post_op: Some(p.paymaster_post_op_gas_limit),
            },
            None => Self { paymaster: None, data: None, verification: None, post_op: None },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(version: EntryPointVersion) -> PendingOperation {
        PendingOperation::new(version, Address::repeat_byte(1), U256::from(7), Bytes::from([0xab]))
    }

    #[test]
    fn resolve_reports_first_missing_field() {
        let mut op = pending(EntryPointVersion::V07);
        assert_eq!(op.resolve().unwrap_err(), OperationError::Unresolved("callGasLimit"));

        op.set_gas(&GasEstimate::new(U256::from(1), U256::from(2), U256::from(3)));
        assert_eq!(op.resolve().unwrap_err(), OperationError::Unresolved("maxFeePerGas"));

        op.set_fees(FeeEstimate::new(U256::from(10), U256::from(1)));
        let resolved = op.resolve().unwrap();
        assert_eq!(resolved.pre_verification_gas(), U256::from(3));
        assert!(!resolved.sponsorship().is_sponsored());
    }

    #[test]
    fn v07_rejects_values_wider_than_packing() {
        let wide = U256::from(u128::MAX) + U256::from(1);
        let mut op = pending(EntryPointVersion::V07);
        op.set_gas(&GasEstimate::new(U256::from(1), U256::from(2), wide));
        op.set_fees(FeeEstimate::new(U256::from(u128::MAX), U256::from(1)));
        // preVerificationGas is a full word on both versions.
        assert!(op.resolve().is_ok());

        op.set_fees(FeeEstimate::new(wide, U256::from(1)));
        assert_eq!(
            op.resolve().unwrap_err(),
            OperationError::Oversized { field: "maxFeePerGas", value: wide }
        );

        let mut v06 = pending(EntryPointVersion::V06);
        v06.set_gas(&GasEstimate::new(wide, U256::from(2), U256::from(3)));
        v06.set_fees(FeeEstimate::new(wide, U256::from(1)));
        assert!(v06.resolve().is_ok());
    }

    #[test]
    fn placeholder_zero_fills() {
        let op = pending(EntryPointVersion::V06).to_placeholder().unwrap();
        assert_eq!(op.call_gas_limit(), U256::ZERO);
        assert_eq!(op.fees(), FeeEstimate::default());
    }

    #[test]
    fn sponsorship_version_is_checked() {
        let mut op = pending(EntryPointVersion::V06);
        let err = op.set_sponsorship(Sponsorship::none(EntryPointVersion::V07)).unwrap_err();
        assert_eq!(
            err,
            OperationError::VersionMismatch {
                expected: EntryPointVersion::V06,
                actual: EntryPointVersion::V07
            }
        );
        op.set_sponsorship(Sponsorship::none(EntryPointVersion::V06)).unwrap();
    }

    #[test]
    fn init_code_shapes() {
        let init = InitCode { factory: Address::repeat_byte(0xfa), factory_data: Bytes::from([1, 2]) };

        let v06 = pending(EntryPointVersion::V06)
            .with_init_code(Some(init.clone()))
            .to_placeholder()
            .unwrap();
        let UserOperation::V06(inner) = &v06 else { panic!("expected v0.6") };
        assert_eq!(inner.init_code.len(), 22);
        assert_eq!(v06.init_code(), Some(init.clone()));

        let v07 = pending(EntryPointVersion::V07)
            .with_init_code(Some(init.clone()))
            .to_placeholder()
            .unwrap();
        let UserOperation::V07(inner) = &v07 else { panic!("expected v0.7") };
        assert_eq!(inner.factory, Some(init.factory));
        assert_eq!(v07.init_code(), Some(init));
    }

    #[test]
    fn seeded_keeps_identity_only() {
        let mut op = pending(EntryPointVersion::V07);
        op.set_gas(&GasEstimate::new(U256::from(1), U256::from(2), U256::from(3)));
        op.set_fees(FeeEstimate::new(U256::from(10), U256::from(1)));
        let resolved = op.resolve().unwrap();

        let seeded = PendingOperation::seeded_from(&resolved);
        assert_eq!(seeded.fingerprint(), op.fingerprint());
        assert!(seeded.call_gas_limit.is_none());
        assert!(seeded.fees().is_none());
    }
}
