//! Core types, configuration, and error handling for Tripwire.
//!
//! This crate provides the shared foundation used by all other Tripwire crates:
//! - [`TripwireError`]: unified error type using `thiserror` and `miette`
//! - [`TripwireConfig`]: configuration loaded from `.tripwire.toml`
//! - Shared types: [`Finding`], [`FindingsSet`], [`ExecutionContext`],
//!   [`Annotation`], [`OutputFormat`]
//! - [`decide_exit`]: the exit policy

mod config;
mod error;
mod exit;
mod types;

pub use config::{HostConfig, HostKind, ReportConfig, RetryConfig, TripwireConfig};
pub use error::TripwireError;
pub use exit::{decide_exit, ExitDecision};
pub use types::{
    Annotation, ExecutionContext, Finding, FindingKind, FindingsSet, OutputFormat,
};

/// A convenience `Result` type for Tripwire operations.
pub type Result<T> = std::result::Result<T, TripwireError>;
