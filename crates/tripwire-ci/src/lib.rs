//! Execution-context resolution for CI jobs.
//!
//! Detects which CI provider the job runs under, whether it is building a
//! pull/merge request, and which request and commits it refers to.

mod env;
mod provider;
mod resolver;

pub use env::Environment;
pub use provider::{CiProvider, PullRequestInfo};
pub use resolver::{detect_provider, resolve, CommitOverrides, NotAPullRequest, Resolution};
