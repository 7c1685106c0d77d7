//! ERC-4337 bundler and paymaster JSON-RPC client.

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

mod client;
pub use client::BundlerClient;

mod error;
pub use error::{BundlerError, Result};

pub mod types;
pub use types::{GasOverrides, RawSponsorshipResponse, SponsorshipRequest, SponsorshipResponse};
