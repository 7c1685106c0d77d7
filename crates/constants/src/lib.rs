//! User operation SDK constants.
//!
//! This crate contains the protocol constants shared by the rest of the SDK,
//! including the canonical entry point deployments, placeholder values used
//! while an operation is still being built, and default pipeline tuning.

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

mod entry_point;
pub use entry_point::{
    EntryPoint, EntryPointVersion, ParseEntryPointVersionError, ENTRY_POINT_V06_ADDRESS,
    ENTRY_POINT_V07_ADDRESS,
};

mod paymaster;
pub use paymaster::{
    DEFAULT_PAYMASTER_POST_OP_GAS_LIMIT, DEFAULT_PAYMASTER_VERIFICATION_GAS_LIMIT,
    DEFAULT_STUB_SIGNATURE,
};

mod pipeline;
pub use pipeline::{
    DEFAULT_RECEIPT_MAX_ATTEMPTS, DEFAULT_RECEIPT_POLL_INTERVAL_MS,
    DEFAULT_SPONSORSHIP_CACHE_CAPACITY,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
