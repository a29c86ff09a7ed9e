use tracing::{debug, info};
use tripwire_core::{ExecutionContext, TripwireError};

use crate::env::Environment;
use crate::provider::CiProvider;

/// Commits supplied explicitly by the caller (`--base`, `--head`).
///
/// A supplied value always wins over whatever the provider reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitOverrides {
    /// Base commit override.
    pub base: Option<String>,
    /// Head commit override.
    pub head: Option<String>,
}

/// Signal that the job is not building a pull/merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotAPullRequest {
    /// Name of the detected provider.
    pub provider_name: String,
    /// `"Merge Request"` on GitLab, `"Pull Request"` elsewhere.
    pub terminology: &'static str,
}

impl NotAPullRequest {
    /// Warning shown to the user before the run is skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use tripwire_ci::NotAPullRequest;
    ///
    /// let signal = NotAPullRequest {
    ///     provider_name: "GitLabCI".into(),
    ///     terminology: "Merge Request",
    /// };
    /// assert_eq!(
    ///     signal.message(),
    ///     "Not a GitLabCI Merge Request - skipping `tripwire` run."
    /// );
    /// ```
    pub fn message(&self) -> String {
        let mut msg = format!(
            "Not a {} {} - skipping `tripwire` run.",
            self.provider_name, self.terminology
        );
        // CircleCI can start the build before the pull request exists.
        if self.provider_name == CiProvider::CircleCi.name() {
            msg.push_str(" If you only created the PR recently, try re-running your workflow.");
        }
        msg
    }
}

/// Result of resolving the execution context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The job builds a pull request; the run continues.
    PullRequest {
        /// Provider that matched the environment.
        provider: CiProvider,
        /// Context threaded through the rest of the run.
        context: ExecutionContext,
    },
    /// The job is not building a pull request; the run stops here.
    NotAPullRequest(NotAPullRequest),
}

impl Resolution {
    /// `true` for [`Resolution::PullRequest`].
    pub fn is_pull_request(&self) -> bool {
        matches!(self, Resolution::PullRequest { .. })
    }
}

/// Pick the first candidate whose markers are all present.
///
/// # Errors
///
/// Returns [`TripwireError::NoCiDetected`] when no candidate matches.
///
/// # Examples
///
/// ```
/// use tripwire_ci::{detect_provider, CiProvider, Environment};
///
/// let env: Environment = [("CIRCLE_BUILD_NUM", "5")].into_iter().collect();
/// assert_eq!(detect_provider(&CiProvider::PRIORITY, &env).unwrap(), CiProvider::CircleCi);
/// assert!(detect_provider(&CiProvider::PRIORITY, &Environment::default()).is_err());
/// ```
pub fn detect_provider(
    candidates: &[CiProvider],
    env: &Environment,
) -> Result<CiProvider, TripwireError> {
    candidates
        .iter()
        .copied()
        .find(|p| p.markers_present(env))
        .ok_or(TripwireError::NoCiDetected)
}

/// Work out whether this job builds a pull request, and for which commits.
///
/// Only the environment map is read, plus the event payload file it points
/// to on GitHub Actions. Commits the provider cannot supply are
/// left empty here and may be filled from the host's pull request metadata.
///
/// # Errors
///
/// Returns [`TripwireError::NoCiDetected`] when no candidate provider matches.
///
/// # Examples
///
/// ```
/// use tripwire_ci::{resolve, CiProvider, CommitOverrides, Environment, Resolution};
///
/// let env: Environment = [
///     ("CIRCLE_BUILD_NUM", "5"),
///     ("CI_PULL_REQUEST", "https://github.com/artsy/eigen/pull/800"),
/// ]
/// .into_iter()
/// .collect();
/// let overrides = CommitOverrides { base: Some("2525245".into()), head: None };
///
/// match resolve(&CiProvider::PRIORITY, &env, &overrides).unwrap() {
///     Resolution::PullRequest { context, .. } => {
///         assert_eq!(context.pr_identifier, "artsy/eigen#800");
///         assert_eq!(context.base_commit, "2525245");
///     }
///     Resolution::NotAPullRequest(_) => unreachable!(),
/// }
/// ```
pub fn resolve(
    candidates: &[CiProvider],
    env: &Environment,
    overrides: &CommitOverrides,
) -> Result<Resolution, TripwireError> {
    let provider = detect_provider(candidates, env)?;
    debug!(provider = %provider, "detected CI provider");

    let Some(pr) = provider.pull_request(env) else {
        info!(provider = %provider, "job is not building a pull request");
        return Ok(Resolution::NotAPullRequest(NotAPullRequest {
            provider_name: provider.name().to_string(),
            terminology: provider.terminology(),
        }));
    };

    let base_commit = overrides
        .base
        .clone()
        .or(pr.base_commit)
        .unwrap_or_default();
    let head_commit = overrides
        .head
        .clone()
        .or(pr.head_commit)
        .unwrap_or_default();

    info!(provider = %provider, pr = %pr.identifier, "resolved pull request");
    Ok(Resolution::PullRequest {
        provider,
        context: ExecutionContext {
            provider_name: provider.name().to_string(),
            is_pull_request: true,
            pr_identifier: pr.identifier,
            base_commit,
            head_commit,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &[(&str, &str)]) -> Environment {
        vars.iter().copied().collect()
    }

    fn gitlab_mr() -> Environment {
        env(&[
            ("GITLAB_CI", "true"),
            ("CI_MERGE_REQUEST_IID", "3"),
            ("CI_PROJECT_PATH", "group/project"),
            ("CI_MERGE_REQUEST_DIFF_BASE_SHA", "provider-base"),
            ("CI_COMMIT_SHA", "provider-head"),
        ])
    }

    #[test]
    fn no_markers_is_fatal() {
        let result = resolve(&CiProvider::PRIORITY, &env(&[("PATH", "/bin")]), &CommitOverrides::default());
        assert!(matches!(result, Err(TripwireError::NoCiDetected)));
    }

    #[test]
    fn first_matching_candidate_wins() {
        let e = env(&[("GITHUB_ACTIONS", "true"), ("GITLAB_CI", "true")]);
        assert_eq!(
            detect_provider(&CiProvider::PRIORITY, &e).unwrap(),
            CiProvider::GitHubActions
        );
        assert_eq!(
            detect_provider(&[CiProvider::GitLabCi, CiProvider::GitHubActions], &e).unwrap(),
            CiProvider::GitLabCi
        );
    }

    #[test]
    fn candidates_outside_the_list_are_ignored() {
        let e = env(&[("GITLAB_CI", "true")]);
        assert!(detect_provider(&[CiProvider::CircleCi], &e).is_err());
    }

    #[test]
    fn gitlab_not_a_merge_request_uses_gitlab_terminology() {
        let e = env(&[("GITLAB_CI", "true"), ("CI_PROJECT_PATH", "group/project")]);
        let resolution = resolve(&CiProvider::PRIORITY, &e, &CommitOverrides::default()).unwrap();
        assert_eq!(
            resolution,
            Resolution::NotAPullRequest(NotAPullRequest {
                provider_name: "GitLabCI".into(),
                terminology: "Merge Request",
            })
        );
        assert!(!resolution.is_pull_request());
    }

    #[test]
    fn circle_not_a_pull_request_adds_rerun_hint() {
        let e = env(&[("CIRCLE_BUILD_NUM", "9")]);
        let Resolution::NotAPullRequest(signal) =
            resolve(&CiProvider::PRIORITY, &e, &CommitOverrides::default()).unwrap()
        else {
            panic!("expected not-a-pull-request");
        };
        assert_eq!(
            signal.message(),
            "Not a CircleCI Pull Request - skipping `tripwire` run. \
             If you only created the PR recently, try re-running your workflow."
        );
    }

    #[test]
    fn travis_message_has_no_hint() {
        let signal = NotAPullRequest {
            provider_name: "Travis".into(),
            terminology: "Pull Request",
        };
        assert_eq!(
            signal.message(),
            "Not a Travis Pull Request - skipping `tripwire` run."
        );
    }

    #[test]
    fn provider_commits_are_used_without_overrides() {
        let resolution =
            resolve(&CiProvider::PRIORITY, &gitlab_mr(), &CommitOverrides::default()).unwrap();
        let Resolution::PullRequest { provider, context } = resolution else {
            panic!("expected pull request");
        };
        assert_eq!(provider, CiProvider::GitLabCi);
        assert_eq!(context.provider_name, "GitLabCI");
        assert!(context.is_pull_request);
        assert_eq!(context.pr_identifier, "group/project!3");
        assert_eq!(context.base_commit, "provider-base");
        assert_eq!(context.head_commit, "provider-head");
    }

    #[test]
    fn overrides_win_over_provider_commits() {
        let overrides = CommitOverrides {
            base: Some("user-base".into()),
            head: Some("user-head".into()),
        };
        let Resolution::PullRequest { context, .. } =
            resolve(&CiProvider::PRIORITY, &gitlab_mr(), &overrides).unwrap()
        else {
            panic!("expected pull request");
        };
        assert_eq!(context.base_commit, "user-base");
        assert_eq!(context.head_commit, "user-head");
    }

    #[test]
    fn unknown_commits_are_empty() {
        let e = env(&[
            ("GITHUB_ACTIONS", "true"),
            ("GITHUB_EVENT_NAME", "pull_request"),
            ("GITHUB_REPOSITORY", "o/r"),
            ("GITHUB_REF", "refs/pull/1/merge"),
        ]);
        let Resolution::PullRequest { context, .. } =
            resolve(&CiProvider::PRIORITY, &e, &CommitOverrides::default()).unwrap()
        else {
            panic!("expected pull request");
        };
        assert_eq!(context.base_commit, "");
        assert_eq!(context.head_commit, "");
    }
}
