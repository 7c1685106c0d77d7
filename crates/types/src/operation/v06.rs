use crate::InitCode;
use alloy::{
    primitives::{keccak256, Address, Bytes, B256, U256},
    sol_types::SolValue,
};
use serde::{Deserialize, Serialize};

/// A fully resolved user operation for the v0.6 entry point.
///
/// Init code and paymaster data are opaque blobs in this version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationV06 {
    /// The account sending the operation.
    pub sender: Address,
    /// Anti-replay nonce, including the 192-bit key.
    pub nonce: U256,
    /// Factory address followed by factory calldata, empty once deployed.
    pub init_code: Bytes,
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
    /// Paymaster address followed by paymaster data, empty when
    /// self-sponsored.
    pub paymaster_and_data: Bytes,
    /// The account signature.
    pub signature: Bytes,
}

impl UserOperationV06 {
    /// Get the factory and factory calldata, if the operation deploys the
    /// account.
    pub fn init_code(&self) -> Option<InitCode> {
        InitCode::from_bytes(&self.init_code)
    }

    /// ABI-encode the signed fields, hashing the dynamic ones.
    pub fn pack(&self) -> Bytes {
        (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            self.call_gas_limit,
            self.verification_gas_limit,
            self.pre_verification_gas,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
            keccak256(&self.paymaster_and_data),
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

    fn op() -> UserOperationV06 {
        UserOperationV06 {
            sender: address!("0x1306b01bC3e4AD202612D3843387e94737673F53"),
            nonce: U256::from(8942),
            init_code: bytes!("6942069420694206942069420694206942069420"),
            call_data: bytes!("0000000000000000000000000000000000000000080085"),
            call_gas_limit: U256::from(10_000),
            verification_gas_limit: U256::from(100_000),
            pre_verification_gas: U256::from(100),
            max_fee_per_gas: U256::from(99_999),
            max_priority_fee_per_gas: U256::from(9_999_999),
            paymaster_and_data: bytes!(
                "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef"
            ),
            signature: bytes!("da0929f527cded8d0a1eaf2e8861d7f7e2d8160b7b13942f99dd367df4473a"),
        }
    }

    #[test]
    fn hash_matches_entry_point() {
        // Reference value produced by the deployed v0.6 entry point's
        // `getUserOpHash`.
        let entry_point = address!("0x66a15edcc3b50a663e72f1457ffd49b9ae284ddc");
        assert_eq!(
            op().hash(entry_point, 1337),
            b256!("0x484add9e4d8c3172d11b5feb6a3cc712280e176d278027cfa02ee396eb28afa1")
        );
    }

    #[test]
    fn signature_is_not_hashed() {
        let mut other = op();
        other.signature = Bytes::new();
        assert_eq!(op().hash(Address::ZERO, 1), other.hash(Address::ZERO, 1));
    }

    #[test]
    fn serde_uses_rpc_field_names() {
        let json = serde_json::to_value(op()).unwrap();
        assert_eq!(json["callGasLimit"], "0x2710");
        assert_eq!(json["initCode"], "0x6942069420694206942069420694206942069420");
        let back: UserOperationV06 = serde_json::from_value(json).unwrap();
        assert_eq!(back, op());
    }
}
