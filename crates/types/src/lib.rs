//! Types and utilities for building ERC-4337 user operations.
//!
//! This crate contains the data model shared by the rest of the SDK:
//! - exact decimal scaling for gas and fee arithmetic
//! - version-tagged user operations and their hashes
//! - caller overrides and fee-policy options
//! - multisig signature aggregation
//! - environment-driven configuration

#![warn(
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    clippy::missing_const_for_fn,
    rustdoc::all
)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub use config::{ClientConfig, ConfigError, SponsorshipPolicy};

mod fees;
pub use fees::{FeeEstimate, GasEstimate};

mod fingerprint;
pub use fingerprint::OperationFingerprint;

pub mod multisig;

mod operation;
pub use operation::{
    Call, InitCode, OperationError, PaymasterData, PendingOperation, Sponsorship, UserOperation,
    UserOperationV06, UserOperationV07,
};

mod overrides;
pub use overrides::{
    resolve_field, FeeOption, FeeOptions, FieldOverride, OperationOverrides, OverrideError,
    SponsorshipOverride,
};

mod receipt;
pub use receipt::{ReceiptInfo, ReceiptStatus, UserOperationReceipt};

mod scale;
pub use scale::{
    bigint_max, clamp, scale, scale_unsigned, Multiplier, RoundingMode, ScaleError,
    MAX_MULTIPLIER_DECIMALS,
};

#[cfg(any(test, feature = "test-utils"))]
/// Utilities for testing.
pub mod test_utils;
