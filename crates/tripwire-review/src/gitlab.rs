use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use tripwire_core::{Annotation, TripwireError};

use crate::host::{error_for_status, PullRequestMetadata, ReviewHost};

const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

/// GitLab client for merge request notes, over the v4 REST API.
pub struct GitLabClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

#[derive(Deserialize)]
struct Note {
    id: u64,
    #[serde(default)]
    body: String,
    #[serde(default)]
    system: bool,
}

#[derive(Deserialize)]
struct MergeRequest {
    #[serde(default)]
    sha: Option<String>,
    #[serde(default)]
    diff_refs: Option<DiffRefs>,
    #[serde(default)]
    labels: Vec<String>,
}

#[derive(Deserialize)]
struct DiffRefs {
    base_sha: Option<String>,
    head_sha: Option<String>,
}

impl GitLabClient {
    /// Create a client from an explicit token or the `GITLAB_TOKEN` environment
    /// variable.
    ///
    /// `api_url` defaults to `https://gitlab.com/api/v4`.
    ///
    /// # Errors
    ///
    /// Returns [`TripwireError::Config`] if no token is available or the HTTP
    /// client cannot be built.
    ///
    /// # Examples
    ///
    /// ```
    /// use tripwire_review::gitlab::GitLabClient;
    ///
    /// let client = GitLabClient::new(Some("glpat-xxxx"), None).unwrap();
    /// assert_eq!(client.api_url(), "https://gitlab.com/api/v4");
    /// ```
    pub fn new(token: Option<&str>, api_url: Option<&str>) -> Result<Self, TripwireError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITLAB_TOKEN").map_err(|_| {
                TripwireError::Config(
                    "GITLAB_TOKEN not set. Set GITLAB_TOKEN to post merge request notes".into(),
                )
            })?,
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("tripwire")
            .build()
            .map_err(|e| TripwireError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url
                .unwrap_or(DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            token,
        })
    }

    /// Base URL requests are sent to.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn merge_request_url(&self, pr: &str) -> Result<String, TripwireError> {
        let (project, iid) = parse_mr_reference(pr)?;
        Ok(format!(
            "{}/projects/{}/merge_requests/{iid}",
            self.api_url,
            project.replace('/', "%2F")
        ))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<reqwest::Response, TripwireError> {
        let response = request
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| map_error(context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(error_for_status(status.as_u16(), context, &body));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T, TripwireError> {
        response.json().await.map_err(|e| {
            TripwireError::FatalNetwork(format!("{context}: malformed response: {e}"))
        })
    }
}

#[async_trait]
impl ReviewHost for GitLabClient {
    async fn list_comments(&self, pr: &str) -> Result<Vec<Annotation>, TripwireError> {
        let url = format!("{}/notes", self.merge_request_url(pr)?);
        let mut annotations = Vec::new();
        let mut page = 1u32;
        loop {
            let page_param = page.to_string();
            let request = self.http.get(&url).query(&[
                ("sort", "asc"),
                ("order_by", "created_at"),
                ("per_page", "100"),
                ("page", page_param.as_str()),
            ]);
            let response = self.send(request, "list notes").await?;
            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());
            let notes: Vec<Note> = Self::json(response, "list notes").await?;
            annotations.extend(notes.into_iter().filter(|n| !n.system).map(|n| Annotation {
                id: n.id.to_string(),
                body: n.body,
            }));
            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }
        debug!(pr, count = annotations.len(), "fetched notes");
        Ok(annotations)
    }

    async fn create_comment(&self, pr: &str, body: &str) -> Result<Annotation, TripwireError> {
        let url = format!("{}/notes", self.merge_request_url(pr)?);
        let request = self.http.post(&url).json(&serde_json::json!({ "body": body }));
        let note: Note = Self::json(self.send(request, "create note").await?, "create note").await?;
        Ok(Annotation {
            id: note.id.to_string(),
            body: note.body,
        })
    }

    async fn update_comment(
        &self,
        pr: &str,
        id: &str,
        body: &str,
    ) -> Result<Annotation, TripwireError> {
        let url = format!("{}/notes/{id}", self.merge_request_url(pr)?);
        let request = self.http.put(&url).json(&serde_json::json!({ "body": body }));
        let note: Note = Self::json(self.send(request, "update note").await?, "update note").await?;
        Ok(Annotation {
            id: note.id.to_string(),
            body: note.body,
        })
    }

    async fn delete_comment(&self, pr: &str, id: &str) -> Result<(), TripwireError> {
        let url = format!("{}/notes/{id}", self.merge_request_url(pr)?);
        let response = self
            .http
            .delete(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await
            .map_err(|e| map_error("delete note", e))?;

        let status = response.status();
        if status.is_success() || status == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status.as_u16(), "delete note", &body))
    }

    async fn pull_request_metadata(
        &self,
        pr: &str,
    ) -> Result<PullRequestMetadata, TripwireError> {
        let request = self.http.get(self.merge_request_url(pr)?);
        let mr: MergeRequest = Self::json(
            self.send(request, "get merge request").await?,
            "get merge request",
        )
        .await?;
        let (base_sha, head_sha) = match mr.diff_refs {
            Some(refs) => (refs.base_sha, refs.head_sha.or(mr.sha)),
            None => (None, mr.sha),
        };
        Ok(PullRequestMetadata {
            base_sha: base_sha.unwrap_or_default(),
            head_sha: head_sha.unwrap_or_default(),
            labels: mr.labels,
        })
    }
}

fn map_error(context: &str, err: reqwest::Error) -> TripwireError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        TripwireError::TransientNetwork(format!("{context}: {err}"))
    } else {
        TripwireError::FatalNetwork(format!("{context}: {err}"))
    }
}

/// Parse a merge request reference (`group/project!iid`).
///
/// # Errors
///
/// Returns [`TripwireError::InvalidPullRequest`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use tripwire_review::gitlab::parse_mr_reference;
///
/// let (project, iid) = parse_mr_reference("group/sub/project!42").unwrap();
/// assert_eq!(project, "group/sub/project");
/// assert_eq!(iid, 42);
/// ```
pub fn parse_mr_reference(mr_ref: &str) -> Result<(String, u64), TripwireError> {
    let Some((project, iid_str)) = mr_ref.rsplit_once('!') else {
        return Err(TripwireError::InvalidPullRequest(format!(
            "'{mr_ref}', expected group/project!iid"
        )));
    };
    if !project.contains('/') {
        return Err(TripwireError::InvalidPullRequest(format!(
            "'{mr_ref}', expected group/project!iid"
        )));
    }
    let iid: u64 = iid_str
        .parse()
        .map_err(|_| TripwireError::InvalidPullRequest(format!("invalid MR iid: {iid_str}")))?;
    Ok((project.to_string(), iid))
}
