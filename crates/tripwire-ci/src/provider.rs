use std::fmt;

use serde::Deserialize;
use tracing::warn;

use crate::env::Environment;

/// A CI service tripwire knows how to read.
///
/// The set is closed: every provider answers the same three questions
/// (are my markers present, is this a pull request, which request and
/// commits) from the environment alone.
///
/// # Examples
///
/// ```
/// use tripwire_ci::{CiProvider, Environment};
///
/// let env: Environment = [("GITLAB_CI", "true")].into_iter().collect();
/// assert!(CiProvider::GitLabCi.markers_present(&env));
/// assert_eq!(CiProvider::GitLabCi.terminology(), "Merge Request");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiProvider {
    /// GitHub Actions workflows.
    GitHubActions,
    /// GitLab CI/CD pipelines.
    GitLabCi,
    /// CircleCI.
    CircleCi,
    /// Travis CI.
    Travis,
    /// Jenkins with the GitHub pull request builder plugin.
    Jenkins,
}

/// Pull request details a provider can read from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    /// `owner/repo#123` for GitHub-hosted code, `group/project!42` for GitLab.
    pub identifier: String,
    /// Base commit, when the provider exposes it.
    pub base_commit: Option<String>,
    /// Head commit, when the provider exposes it.
    pub head_commit: Option<String>,
}

impl CiProvider {
    /// Probe order used when no explicit candidate list is given.
    pub const PRIORITY: [CiProvider; 5] = [
        CiProvider::GitHubActions,
        CiProvider::GitLabCi,
        CiProvider::CircleCi,
        CiProvider::Travis,
        CiProvider::Jenkins,
    ];

    /// Display name used in logs and user-facing messages.
    pub fn name(self) -> &'static str {
        match self {
            CiProvider::GitHubActions => "GitHubActions",
            CiProvider::GitLabCi => "GitLabCI",
            CiProvider::CircleCi => "CircleCI",
            CiProvider::Travis => "Travis",
            CiProvider::Jenkins => "Jenkins",
        }
    }

    /// What the code-review unit is called on this provider's host.
    pub fn terminology(self) -> &'static str {
        match self {
            CiProvider::GitLabCi => "Merge Request",
            _ => "Pull Request",
        }
    }

    /// Variables that must all be set for this provider to be selected.
    pub fn markers(self) -> &'static [&'static str] {
        match self {
            CiProvider::GitHubActions => &["GITHUB_ACTIONS"],
            CiProvider::GitLabCi => &["GITLAB_CI"],
            CiProvider::CircleCi => &["CIRCLE_BUILD_NUM"],
            CiProvider::Travis => &["TRAVIS", "TRAVIS_REPO_SLUG"],
            CiProvider::Jenkins => &["JENKINS_URL"],
        }
    }

    /// `true` when every marker variable is present.
    pub fn markers_present(self, env: &Environment) -> bool {
        self.markers().iter().all(|m| env.has(m))
    }

    /// Pull request details, or `None` when the job is not building one.
    pub fn pull_request(self, env: &Environment) -> Option<PullRequestInfo> {
        match self {
            CiProvider::GitHubActions => github_actions(env),
            CiProvider::GitLabCi => gitlab_ci(env),
            CiProvider::CircleCi => circle_ci(env),
            CiProvider::Travis => travis(env),
            CiProvider::Jenkins => jenkins(env),
        }
    }
}

impl fmt::Display for CiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn github_actions(env: &Environment) -> Option<PullRequestInfo> {
    let event = env.get("GITHUB_EVENT_NAME")?;
    if event != "pull_request" && event != "pull_request_target" {
        return None;
    }
    let repo = env.get("GITHUB_REPOSITORY")?;

    // pull_request_target runs on the base branch, so only the payload names the PR.
    if let Some(pull) = env.get("GITHUB_EVENT_PATH").and_then(read_event_payload) {
        return Some(PullRequestInfo {
            identifier: format!("{repo}#{}", pull.number),
            base_commit: pull.base.sha.filter(|s| !s.is_empty()),
            head_commit: pull.head.sha.filter(|s| !s.is_empty()),
        });
    }

    // refs/pull/<number>/merge or refs/pull/<number>/head
    let number = env
        .get("GITHUB_REF")?
        .strip_prefix("refs/pull/")?
        .split('/')
        .next()?
        .parse::<u64>()
        .ok()?;
    Some(PullRequestInfo {
        identifier: format!("{repo}#{number}"),
        base_commit: None,
        head_commit: None,
    })
}

#[derive(Deserialize)]
struct EventPayload {
    pull_request: Option<EventPullRequest>,
}

#[derive(Deserialize)]
struct EventPullRequest {
    number: u64,
    #[serde(default)]
    base: EventRef,
    #[serde(default)]
    head: EventRef,
}

#[derive(Deserialize, Default)]
struct EventRef {
    sha: Option<String>,
}

/// The `pull_request` object of a GitHub Actions event payload.
fn read_event_payload(path: &str) -> Option<EventPullRequest> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!(path, error = %e, "cannot read GitHub event payload");
            return None;
        }
    };
    match serde_json::from_str::<EventPayload>(&content) {
        Ok(payload) => payload.pull_request,
        Err(e) => {
            warn!(path, error = %e, "malformed GitHub event payload");
            None
        }
    }
}

fn gitlab_ci(env: &Environment) -> Option<PullRequestInfo> {
    let iid = env.get("CI_MERGE_REQUEST_IID")?.parse::<u64>().ok()?;
    let project = env
        .get("CI_MERGE_REQUEST_PROJECT_PATH")
        .or_else(|| env.get("CI_PROJECT_PATH"))?;
    Some(PullRequestInfo {
        identifier: format!("{project}!{iid}"),
        base_commit: env.get("CI_MERGE_REQUEST_DIFF_BASE_SHA").map(str::to_string),
        // CI_COMMIT_SHA is the merge commit in merged-results pipelines.
        head_commit: env
            .get("CI_MERGE_REQUEST_SOURCE_BRANCH_SHA")
            .or_else(|| env.get("CI_COMMIT_SHA"))
            .map(str::to_string),
    })
}

fn circle_ci(env: &Environment) -> Option<PullRequestInfo> {
    let url = env
        .get("CI_PULL_REQUEST")
        .or_else(|| env.get("CIRCLE_PULL_REQUEST"))?;
    let identifier = identifier_from_pull_url(url)?;
    let (base_commit, head_commit) = match env
        .get("CIRCLE_COMPARE_URL")
        .and_then(|u| u.rsplit('/').next())
        .and_then(split_commit_range)
    {
        Some((base, head)) => (Some(base), Some(head)),
        None => (None, env.get("CIRCLE_SHA1").map(str::to_string)),
    };
    Some(PullRequestInfo {
        identifier,
        base_commit,
        head_commit,
    })
}

fn travis(env: &Environment) -> Option<PullRequestInfo> {
    let number = env.get("TRAVIS_PULL_REQUEST")?.parse::<u64>().ok()?;
    let slug = env.get("TRAVIS_REPO_SLUG")?;
    let base_commit = env
        .get("TRAVIS_COMMIT_RANGE")
        .and_then(split_commit_range)
        .map(|(base, _)| base);
    Some(PullRequestInfo {
        identifier: format!("{slug}#{number}"),
        base_commit,
        head_commit: env.get("TRAVIS_PULL_REQUEST_SHA").map(str::to_string),
    })
}

fn jenkins(env: &Environment) -> Option<PullRequestInfo> {
    let number = env.get("ghprbPullId")?.parse::<u64>().ok()?;
    let repo = env.get("ghprbGhRepository")?;
    Some(PullRequestInfo {
        identifier: format!("{repo}#{number}"),
        base_commit: None,
        head_commit: env.get("ghprbActualCommit").map(str::to_string),
    })
}

/// Turn `https://github.com/owner/repo/pull/123` into `owner/repo#123`.
fn identifier_from_pull_url(url: &str) -> Option<String> {
    let (repo_url, rest) = url.trim_end_matches('/').rsplit_once("/pull/")?;
    let number = rest.split('/').next()?.parse::<u64>().ok()?;
    let mut segments = repo_url.rsplit('/');
    let repo = segments.next().filter(|s| !s.is_empty())?;
    let owner = segments.next().filter(|s| !s.is_empty())?;
    Some(format!("{owner}/{repo}#{number}"))
}

/// Split `base...head` (or `base..head`) into its two commits.
fn split_commit_range(range: &str) -> Option<(String, String)> {
    let (base, head) = range
        .split_once("...")
        .or_else(|| range.split_once(".."))?;
    if base.is_empty() || head.is_empty() {
        return None;
    }
    Some((base.to_string(), head.to_string()))
}
