//! ERC-4337 user operation client.
//!
//! Builds operations from a smart account's calls, prices and sponsors
//! them, and submits them to a bundler. Contains:
//! - the [`Bundler`], [`Paymaster`], [`OperationSigner`] and
//!   [`SmartAccount`] traits the pipeline is generic over
//! - the staged [`Pipeline`] and the [`OperationSender`] that drives it
//! - the [`MultisigSender`] propose and countersign protocol

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

pub mod fee;

pub mod gas;

mod impls;

mod multisig;
pub use multisig::{assemble, MultisigSender};

mod pipeline;
pub use pipeline::{OperationIntent, OperationState, Pipeline, PipelineError};

mod sender;
pub use sender::{OperationSender, SenderConfig};

mod sponsor;
pub use sponsor::{
    NoPaymasterError, NoSponsorship, SponsorshipCache, SponsorshipOutcome, SponsorshipStage,
};

mod traits;
pub use traits::{Bundler, MultisigAccount, OperationSigner, Paymaster, SmartAccount};
