//! Git abstraction layer for forkctl.
//!
//! This crate defines [`VcsDriver`] — the single interface through which the
//! record and replay engines interact with git. Neither engine shells out to
//! `git` directly; they program against this trait so the engines can be
//! exercised in tests against [`fake::FakeVcsDriver`] without a real
//! repository on disk.
//!
//! # Crate layout
//!
//! - [`driver`] — the [`VcsDriver`] trait definition.
//! - [`types`] — value types used in trait signatures ([`Identity`],
//!   [`MergeOutcome`], [`CloneFilter`]).
//! - [`error`] — the [`VcsError`] enum returned by all trait methods.
//! - [`process`] — the default implementation, backed by the `git` binary.
//! - [`fake`] — an in-memory test double.

pub mod driver;
pub mod error;
pub mod fake;
pub mod process;
pub mod types;

pub use driver::VcsDriver;
pub use error::VcsError;
pub use fake::FakeVcsDriver;
pub use process::ProcessVcsDriver;
pub use types::{CloneFilter, Identity, MergeOutcome};
