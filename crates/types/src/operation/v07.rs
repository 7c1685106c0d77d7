use crate::{InitCode, PaymasterData};
use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};

/// A fully resolved user operation for the v0.7 entry point.
///
/// Factory and paymaster fields are discrete on the wire and only packed
/// into `initCode`/`paymasterAndData` for hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationV07 {
    /// The account sending the operation.
    pub sender: Address,
    /// Anti-replay nonce, including the 192-bit key.
    pub nonce: U256,
    /// The account factory, present only before deployment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory: Option<Address>,
    /// Calldata for the factory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factory_data: Option<Bytes>,
    /// The calldata the account executes.
    pub call_data: Bytes,
    /// Gas for the main execution call.
    pub call_gas_limit: U256,
    /// Gas for the validation phase.
    pub verification_gas_limit: U256,
    /// Gas paid to the bundler for overhead not metered on-chain.
    pub pre_verification_gas: U256,
    /// EIP-1559 max fee.
    pub max_fee_per_gas: U256,
    /// EIP-1559 priority fee.
    pub max_priority_fee_per_gas: U256,
    /// The paymaster, absent when self-sponsored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Gas for the paymaster's validation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_verification_gas_limit: Option<U256>,
    /// Gas for the paymaster's post-op call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_post_op_gas_limit: Option<U256>,
    /// Paymaster-specific data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster_data: Option<Bytes>,
    /// The account signature.
    pub signature: Bytes,
}

/// Pack two values into one word, 16 bytes each. Only the low 128 bits of
/// each value are kept; [`PendingOperation::resolve`] rejects larger values.
///
/// [`PendingOperation::resolve`]: crate::PendingOperation::resolve
fn pack_u128_pair(high: U256, low: U256) -> B256 {
    let mut word = [0u8; 32];
    word[..16].copy_from_slice(&high.to_be_bytes::<32>()[16..]);
    word[16..].copy_from_slice(&low.to_be_bytes::<32>()[16..]);
    word.into()
}

impl UserOperationV07 {
    /// Get the factory and factory calldata, if the operation deploys the
    /// account.
    pub fn init_code(&self) -> Option<InitCode> {
        self.factory.map(|factory| InitCode {
            factory,
            factory_data: self.factory_data.clone().unwrap_or_default(),
        })
    }

    /// Get the paymaster fields, if the operation is sponsored.
    pub fn paymaster_fields(&self) -> Option<PaymasterData> {
        self.paymaster.map(|paymaster| PaymasterData {
            paymaster,
            paymaster_data: self.paymaster_data.clone().unwrap_or_default(),
            paymaster_verification_gas_limit: self
                .paymaster_verification_gas_limit
                .unwrap_or_default(),
            paymaster_post_op_gas_limit: self.paymaster_post_op_gas_limit.unwrap_or_default(),
        })
    }

    /// `verificationGasLimit ‖ callGasLimit`.
    pub fn account_gas_limits(&self) -> B256 {
        pack_u128_pair(self.verification_gas_limit, self.call_gas_limit)
    }

    /// `maxPriorityFeePerGas ‖ maxFeePerGas`.
    pub fn gas_fees(&self) -> B256 {
        pack_u128_pair(self.max_priority_fee_per_gas, self.max_fee_per_gas)
    }

    /// ABI-encode the signed fields of the packed operation, hashing the
    /// dynamic ones.
    pub fn pack(&self) -> Bytes {
        let init_code = self.init_code().map(|i| i.to_bytes()).unwrap_or_default();
        let paymaster_and_data =
            self.paymaster_fields().map(|p| p.to_bytes()).unwrap_or_default();
        (
            self.sender,
            self.nonce,
            keccak256(&init_code),
            keccak256(&self.call_data),
            self.account_gas_limits(),
            self.pre_verification_gas,
            self.gas_fees(),
            keccak256(&paymaster_and_data),
        )
            .abi_encode()
            .into()
    }

    /// The operation hash, as computed by the entry point.
    pub fn hash(&self, entry_point: Address, chain_id: u64) -> B256 {
        keccak256((keccak256(self.pack()), entry_point, U256::from(chain_id)).abi_encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, b256, bytes};

    fn op() -> UserOperationV07 {
        UserOperationV07 {
            sender: address!("0x1306b01bC3e4AD202612D3843387e94737673F53"),
            nonce: U256::from(8942),
            factory: Some(address!("0x6942069420694206942069420694206942069420")),
            factory_data: Some(bytes!("c0ffee")),
            call_data: bytes!("0000000000000000000000000000000000000000080085"),
            call_gas_limit: U256::from(10_000),
            verification_gas_limit: U256::from(100_000),
            pre_verification_gas: U256::from(100),
            max_fee_per_gas: U256::from(99_999),
            max_priority_fee_per_gas: U256::from(9_999_999),
            paymaster: Some(address!("0x0123456789abcdef0123456789abcdef01234567")),
            paymaster_verification_gas_limit: Some(U256::from(100_000)),
            paymaster_post_op_gas_limit: Some(U256::from(50_000)),
            paymaster_data: Some(bytes!("beef")),
            signature: bytes!("da0929f527cded8d0a1eaf2e8861d7f7e2d8160b7b13942f99dd367df4473a"),
        }
    }

    #[test]
    fn packed_gas_words() {
        let op = op();
        assert_eq!(
            op.account_gas_limits(),
            b256!("0x000000000000000000000000000186a000000000000000000000000000002710")
        );
        assert_eq!(
            op.gas_fees(),
            b256!("0x0000000000000000000000000098967f0000000000000000000000000001869f")
        );
    }

    #[test]
    fn paymaster_and_data_layout() {
        let packed = op().paymaster_fields().unwrap().to_bytes();
        assert_eq!(packed.len(), 20 + 16 + 16 + 2);
        assert_eq!(&packed[..20], op().paymaster.unwrap().as_slice());
        assert_eq!(&packed[52..], &[0xbe, 0xef]);
    }

    #[test]
    fn hash_reference_value() {
        let entry_point = address!("0x0000000071727De22E5E9d8BAf0edAc6f37da032");
        assert_eq!(
            op().hash(entry_point, 1337),
            b256!("0xa8a540eae22574c52af37442d9814d3573d303dcf02664a31179fc640919a73f")
        );
        // Gas values are part of the hash.
        let mut bumped = op();
        bumped.max_fee_per_gas += U256::from(1);
        assert_ne!(bumped.hash(entry_point, 1337), op().hash(entry_point, 1337));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let mut op = op();
        op.factory = None;
        op.factory_data = None;
        op.paymaster = None;
        op.paymaster_data = None;
        op.paymaster_verification_gas_limit = None;
        op.paymaster_post_op_gas_limit = None;
        let json = serde_json::to_value(&op).unwrap();
        assert!(json.get("factory").is_none());
        assert!(json.get("paymaster").is_none());
        assert_eq!(json["maxFeePerGas"], "0x1869f");
    }
}
