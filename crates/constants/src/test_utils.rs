//! Constants for local tests.

use crate::{EntryPoint, EntryPointVersion};
use alloy::primitives::Address;

/// Test chain id.
pub const TEST_CHAIN_ID: u64 = 31337;

/// Test address for a deployed smart account.
pub const TEST_ACCOUNT: Address = Address::repeat_byte(0xac);

/// Test address for the account factory.
pub const TEST_FACTORY: Address = Address::repeat_byte(0xfa);

/// Test address for the paymaster.
pub const TEST_PAYMASTER: Address = Address::repeat_byte(0x9a);

/// Test sponsorship policy id.
pub const TEST_POLICY_ID: &str = "00000000-0000-4000-8000-00000000beef";

/// Test v0.6 entry point.
pub const TEST_ENTRY_POINT_V06: EntryPoint =
    EntryPoint::new(EntryPointVersion::V06, Address::repeat_byte(0xe6));

/// Test v0.7 entry point.
pub const TEST_ENTRY_POINT_V07: EntryPoint =
    EntryPoint::new(EntryPointVersion::V07, Address::repeat_byte(0xe7));
