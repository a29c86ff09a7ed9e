//! Report publication on code-review hosts.
//!
//! Provides the host abstraction with GitHub and GitLab implementations,
//! host selection, the retry policy for host calls, reconciliation of a
//! rendered report against existing comments, and the end-to-end run pipeline.

pub mod connect;
pub mod github;
pub mod gitlab;
pub mod host;
pub mod pipeline;
pub mod reconcile;
pub mod retry;
