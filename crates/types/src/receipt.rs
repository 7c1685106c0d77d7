use alloy::primitives::{Address, B256, U256, U64};
use serde::{Deserialize, Serialize};

/// The on-chain transaction that included an operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptInfo {
    /// Hash of the bundle transaction.
    pub transaction_hash: B256,
    /// Hash of the including block.
    pub block_hash: B256,
    /// Number of the including block.
    pub block_number: U64,
}

/// Receipt returned by `eth_getUserOperationReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperationReceipt {
    /// The operation hash.
    pub user_op_hash: B256,
    /// The entry point that executed the operation.
    pub entry_point: Address,
    /// The sending account.
    pub sender: Address,
    /// The operation nonce.
    pub nonce: U256,
    /// The paymaster that paid, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paymaster: Option<Address>,
    /// Total gas cost charged.
    pub actual_gas_cost: U256,
    /// Total gas used.
    pub actual_gas_used: U256,
    /// Whether execution succeeded.
    pub success: bool,
    /// Revert reason, if execution failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// The including transaction.
    pub receipt: ReceiptInfo,
}

impl UserOperationReceipt {
    /// The receipt's status.
    pub fn status(&self) -> ReceiptStatus {
        if self.success {
            ReceiptStatus::Success
        } else {
            ReceiptStatus::Failed { reason: self.reason.clone() }
        }
    }
}

/// Inclusion status of a submitted operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Not yet included.
    Pending,
    /// Included and executed successfully.
    Success,
    /// Included, but execution reverted.
    Failed {
        /// Revert reason reported by the bundler.
        reason: Option<String>,
    },
}

impl ReceiptStatus {
    /// Status of an optional receipt. `None` means still pending.
    pub fn from_receipt(receipt: Option<&UserOperationReceipt>) -> Self {
        receipt.map_or(Self::Pending, UserOperationReceipt::status)
    }

    /// True if the operation has been included, successfully or not.
    pub const fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deser_bundler_receipt() {
        let json = r#"{
            "userOpHash": "0x4b2c7dbab2a8a9b1b5e0e8c2d94b8ac5e5a7f1d9d2b6d8b1f7c3a2e9c1d4b6a8",
            "entryPoint": "0x0000000071727de22e5e9d8baf0edac6f37da032",
            "sender": "0xacacacacacacacacacacacacacacacacacacacac",
            "nonce": "0x1",
            "actualGasCost": "0x5af3107a4000",
            "actualGasUsed": "0x1d4c0",
            "success": false,
            "reason": "AA21 didn't pay prefund",
            "receipt": {
                "transactionHash": "0x1111111111111111111111111111111111111111111111111111111111111111",
                "blockHash": "0x2222222222222222222222222222222222222222222222222222222222222222",
                "blockNumber": "0x10"
            }
        }"#;
        let receipt: UserOperationReceipt = serde_json::from_str(json).unwrap();
        assert_eq!(receipt.paymaster, None);
        assert_eq!(receipt.receipt.block_number, U64::from(16));
        assert_eq!(
            receipt.status(),
            ReceiptStatus::Failed { reason: Some("AA21 didn't pay prefund".into()) }
        );
        assert!(ReceiptStatus::from_receipt(Some(&receipt)).is_final());
        assert!(!ReceiptStatus::from_receipt(None).is_final());
    }
}
