use async_trait::async_trait;
use octocrab::models::CommentId;
use tracing::debug;
use tripwire_core::{Annotation, TripwireError};

use crate::host::{error_for_status, PullRequestMetadata, ReviewHost};

/// GitHub client for reading and maintaining pull request comments.
///
/// # Examples
///
/// ```
/// use tripwire_review::github::parse_pr_reference;
///
/// let (owner, repo, number) = parse_pr_reference("rust-lang/rust#12345").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
/// assert_eq!(number, 12345);
/// ```
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
}

impl GitHubClient {
    /// Create a client from an explicit token or the `GITHUB_TOKEN` / `GH_TOKEN`
    /// environment variables.
    ///
    /// `api_url` points the client at a GitHub Enterprise instance.
    ///
    /// # Errors
    ///
    /// Returns [`TripwireError::Config`] if no token is available or the
    /// client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tripwire_review::github::GitHubClient;
    ///
    /// let client = GitHubClient::new(Some("ghp_xxxx"), None).unwrap();
    /// ```
    pub fn new(token: Option<&str>, api_url: Option<&str>) -> Result<Self, TripwireError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN")
                .or_else(|_| std::env::var("GH_TOKEN"))
                .map_err(|_| {
                    TripwireError::Config(
                        "GITHUB_TOKEN not set. Set GITHUB_TOKEN or GH_TOKEN to post comments"
                            .into(),
                    )
                })?,
        };

        let mut builder = octocrab::Octocrab::builder().personal_token(token);
        if let Some(url) = api_url {
            builder = builder.base_uri(url).map_err(|e| {
                TripwireError::Config(format!("invalid GitHub API URL '{url}': {e}"))
            })?;
        }
        let octocrab = builder
            .build()
            .map_err(|e| TripwireError::Config(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }
}

#[async_trait]
impl ReviewHost for GitHubClient {
    async fn list_comments(&self, pr: &str) -> Result<Vec<Annotation>, TripwireError> {
        let (owner, repo, number) = parse_pr_reference(pr)?;
        let first_page = self
            .octocrab
            .issues(&owner, &repo)
            .list_comments(number)
            .per_page(100)
            .send()
            .await
            .map_err(|e| map_error("list comments", e))?;
        let comments = self
            .octocrab
            .all_pages(first_page)
            .await
            .map_err(|e| map_error("list comments", e))?;
        debug!(pr, count = comments.len(), "fetched comments");

        Ok(comments
            .into_iter()
            .map(|c| Annotation {
                id: c.id.to_string(),
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_comment(&self, pr: &str, body: &str) -> Result<Annotation, TripwireError> {
        let (owner, repo, number) = parse_pr_reference(pr)?;
        let comment = self
            .octocrab
            .issues(&owner, &repo)
            .create_comment(number, body)
            .await
            .map_err(|e| map_error("create comment", e))?;
        Ok(Annotation {
            id: comment.id.to_string(),
            body: comment.body.unwrap_or_default(),
        })
    }

    async fn update_comment(
        &self,
        pr: &str,
        id: &str,
        body: &str,
    ) -> Result<Annotation, TripwireError> {
        let (owner, repo, _) = parse_pr_reference(pr)?;
        let comment = self
            .octocrab
            .issues(&owner, &repo)
            .update_comment(parse_comment_id(id)?, body)
            .await
            .map_err(|e| map_error("update comment", e))?;
        Ok(Annotation {
            id: comment.id.to_string(),
            body: comment.body.unwrap_or_default(),
        })
    }

    async fn delete_comment(&self, pr: &str, id: &str) -> Result<(), TripwireError> {
        let (owner, repo, _) = parse_pr_reference(pr)?;
        match self
            .octocrab
            .issues(&owner, &repo)
            .delete_comment(parse_comment_id(id)?)
            .await
        {
            Ok(()) => Ok(()),
            Err(octocrab::Error::GitHub { source, .. }) if source.status_code.as_u16() == 404 => {
                debug!(pr, id, "comment already gone");
                Ok(())
            }
            Err(e) => Err(map_error("delete comment", e)),
        }
    }

    async fn pull_request_metadata(
        &self,
        pr: &str,
    ) -> Result<PullRequestMetadata, TripwireError> {
        let (owner, repo, number) = parse_pr_reference(pr)?;
        let pull = self
            .octocrab
            .pulls(&owner, &repo)
            .get(number)
            .await
            .map_err(|e| map_error("get pull request", e))?;
        Ok(PullRequestMetadata {
            base_sha: pull.base.sha.clone(),
            head_sha: pull.head.sha.clone(),
            labels: pull
                .labels
                .unwrap_or_default()
                .into_iter()
                .map(|l| l.name)
                .collect(),
        })
    }
}

fn map_error(context: &str, err: octocrab::Error) -> TripwireError {
    match err {
        octocrab::Error::GitHub { source, .. } => {
            error_for_status(source.status_code.as_u16(), context, &source.message)
        }
        err @ (octocrab::Error::Serde { .. } | octocrab::Error::Json { .. }) => {
            TripwireError::FatalNetwork(format!("{context}: malformed response: {err}"))
        }
        // Transport-level failures (connect, timeout, hyper) may succeed on retry.
        err => TripwireError::TransientNetwork(format!("{context}: {err}")),
    }
}

fn parse_comment_id(id: &str) -> Result<CommentId, TripwireError> {
    id.parse::<u64>()
        .map(CommentId::from)
        .map_err(|_| TripwireError::InvalidPullRequest(format!("invalid GitHub comment id: {id}")))
}

/// Parse a PR reference string (`owner/repo#number`) into its components.
///
/// # Errors
///
/// Returns [`TripwireError::InvalidPullRequest`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use tripwire_review::github::parse_pr_reference;
///
/// let (owner, repo, num) = parse_pr_reference("octocat/hello-world#42").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// assert_eq!(num, 42);
/// ```
pub fn parse_pr_reference(pr_ref: &str) -> Result<(String, String, u64), TripwireError> {
    let Some((owner_repo, number_str)) = pr_ref.split_once('#') else {
        return Err(TripwireError::InvalidPullRequest(format!(
            "'{pr_ref}', expected owner/repo#number"
        )));
    };
    let Some((owner, repo)) = owner_repo.split_once('/') else {
        return Err(TripwireError::InvalidPullRequest(format!(
            "'{pr_ref}', expected owner/repo#number"
        )));
    };
    let number: u64 = number_str
        .parse()
        .map_err(|_| TripwireError::InvalidPullRequest(format!("invalid PR number: {number_str}")))?;
    Ok((owner.to_string(), repo.to_string(), number))
}
