use async_trait::async_trait;
use serde::Serialize;
use tripwire_core::{Annotation, TripwireError};

/// Pull request details fetched from the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestMetadata {
    /// Base commit SHA.
    pub base_sha: String,
    /// Head commit SHA.
    pub head_sha: String,
    /// Label names, in host order.
    pub labels: Vec<String>,
}

/// Comment operations on a code-review host.
///
/// `pr` is always the identifier from the execution context
/// (`owner/repo#123` on GitHub, `group/project!42` on GitLab).
/// Comments are returned oldest first.
#[async_trait]
pub trait ReviewHost: Send + Sync {
    /// All comments on the pull request, oldest first.
    async fn list_comments(&self, pr: &str) -> Result<Vec<Annotation>, TripwireError>;

    /// Post a new comment.
    async fn create_comment(&self, pr: &str, body: &str) -> Result<Annotation, TripwireError>;

    /// Replace the body of an existing comment.
    async fn update_comment(
        &self,
        pr: &str,
        id: &str,
        body: &str,
    ) -> Result<Annotation, TripwireError>;

    /// Delete a comment. A comment that no longer exists counts as deleted.
    async fn delete_comment(&self, pr: &str, id: &str) -> Result<(), TripwireError>;

    /// Base/head commits and labels of the pull request.
    async fn pull_request_metadata(&self, pr: &str)
        -> Result<PullRequestMetadata, TripwireError>;
}

/// Map an HTTP status to the error taxonomy.
///
/// Timeouts, rate limits and server errors are worth retrying; every other
/// failure status is not.
pub(crate) fn error_for_status(status: u16, context: &str, detail: &str) -> TripwireError {
    let message = format!("{context}: HTTP {status}: {detail}");
    if status == 408 || status == 429 || (500..=599).contains(&status) {
        TripwireError::TransientNetwork(message)
    } else {
        TripwireError::FatalNetwork(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert!(error_for_status(502, "list comments", "bad gateway").is_transient());
        assert!(error_for_status(429, "list comments", "slow down").is_transient());
        assert!(error_for_status(408, "list comments", "timeout").is_transient());
    }

    #[test]
    fn client_errors_are_fatal() {
        let err = error_for_status(401, "create comment", "Bad credentials");
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "network error: create comment: HTTP 401: Bad credentials"
        );
        assert!(!error_for_status(404, "get pull request", "Not Found").is_transient());
    }
}
