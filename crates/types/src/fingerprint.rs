use alloy::{
    primitives::{keccak256, Address, B256, U256},
    sol_types::SolValue,
};
use std::fmt;

/// A canonical key identifying an operation by sender, nonce and calldata.
///
/// Two operations share a fingerprint exactly when all three fields are
/// equal. Gas, fee, sponsorship and signature fields do not contribute, so
/// an operation keeps its fingerprint while the pipeline fills it in.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationFingerprint(B256);

impl OperationFingerprint {
    /// Compute the fingerprint.
    pub fn new(sender: Address, nonce: U256, call_data: &[u8]) -> Self {
        Self(keccak256((sender, nonce, keccak256(call_data)).abi_encode()))
    }

    /// Get the fingerprint as a hash.
    pub const fn as_b256(&self) -> B256 {
        self.0
    }
}

impl fmt::Display for OperationFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_field_contributes() {
        let sender = Address::repeat_byte(1);
        let base = OperationFingerprint::new(sender, U256::from(1), &[1, 2, 3]);
        assert_eq!(base, OperationFingerprint::new(sender, U256::from(1), &[1, 2, 3]));
        assert_ne!(base, OperationFingerprint::new(Address::repeat_byte(2), U256::from(1), &[1, 2, 3]));
        assert_ne!(base, OperationFingerprint::new(sender, U256::from(2), &[1, 2, 3]));
        assert_ne!(base, OperationFingerprint::new(sender, U256::from(1), &[1, 2]));
    }
}
