use tracing::debug;
use tripwire_ci::{CiProvider, Environment};
use tripwire_core::{HostConfig, HostKind, TripwireError};

use crate::github::GitHubClient;
use crate::gitlab::GitLabClient;
use crate::host::ReviewHost;

/// The host API a run talks to.
///
/// An explicit `[host].kind` wins; otherwise GitLab CI jobs report to GitLab
/// and every other provider reports to GitHub.
///
/// # Examples
///
/// ```
/// use tripwire_ci::CiProvider;
/// use tripwire_core::HostKind;
/// use tripwire_review::connect::select_host;
///
/// assert_eq!(select_host(HostKind::Auto, CiProvider::GitLabCi), HostKind::GitLab);
/// assert_eq!(select_host(HostKind::Auto, CiProvider::Travis), HostKind::GitHub);
/// assert_eq!(select_host(HostKind::GitLab, CiProvider::Jenkins), HostKind::GitLab);
/// ```
pub fn select_host(kind: HostKind, provider: CiProvider) -> HostKind {
    match kind {
        HostKind::Auto if provider == CiProvider::GitLabCi => HostKind::GitLab,
        HostKind::Auto => HostKind::GitHub,
        explicit => explicit,
    }
}

/// API base URL for the selected host, if it differs from the public default.
///
/// GitLab jobs expose their instance's API as `CI_API_V4_URL`, which is used
/// when the config leaves `api_url` unset.
pub fn api_url(kind: HostKind, config: &HostConfig, env: &Environment) -> Option<String> {
    if let Some(url) = &config.api_url {
        return Some(url.clone());
    }
    match kind {
        HostKind::GitLab => env.get("CI_API_V4_URL").map(str::to_string),
        _ => None,
    }
}

/// Build the host client for a run, reading the token from the process
/// environment.
///
/// # Errors
///
/// Returns [`TripwireError::Config`] if the token is missing or the client
/// cannot be built.
pub fn connect(
    config: &HostConfig,
    provider: CiProvider,
    env: &Environment,
) -> Result<Box<dyn ReviewHost>, TripwireError> {
    let kind = select_host(config.kind, provider);
    let url = api_url(kind, config, env);
    debug!(provider = %provider, host = ?kind, api_url = ?url, "connecting to review host");
    match kind {
        HostKind::GitLab => Ok(Box::new(GitLabClient::new(None, url.as_deref())?)),
        _ => Ok(Box::new(GitHubClient::new(None, url.as_deref())?)),
    }
}
