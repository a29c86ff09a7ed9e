use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TripwireError;

/// Top-level configuration loaded from `.tripwire.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use tripwire_core::TripwireConfig;
///
/// let config = TripwireConfig::default();
/// assert_eq!(config.report.id, "tripwire");
/// assert_eq!(config.retry.max_attempts, 3);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripwireConfig {
    /// Report identity and exit policy flags.
    #[serde(default)]
    pub report: ReportConfig,
    /// Code-review host selection.
    #[serde(default)]
    pub host: HostConfig,
    /// Retry policy for host API calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl TripwireConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`TripwireError::Io`] if the file cannot be read, or
    /// [`TripwireError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tripwire_core::TripwireConfig;
    /// use std::path::Path;
    ///
    /// let config = TripwireConfig::from_file(Path::new(".tripwire.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, TripwireError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`TripwireError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use tripwire_core::TripwireConfig;
    ///
    /// let toml = r#"
    /// [report]
    /// id = "lint"
    /// "#;
    /// let config = TripwireConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.report.id, "lint");
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, TripwireError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }
}

/// Report identity and policy flags.
///
/// # Examples
///
/// ```
/// use tripwire_core::ReportConfig;
///
/// let config = ReportConfig::default();
/// assert!(!config.fail_on_errors);
/// assert!(!config.fail_if_no_pr);
/// assert!(!config.remove_previous_comments);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Identity folded into the comment marker (default: `"tripwire"`).
    #[serde(default = "default_report_id")]
    pub id: String,
    /// Exit with status 1 when any error finding is reported.
    #[serde(default)]
    pub fail_on_errors: bool,
    /// Exit with status 1 when the job is not running for a pull request.
    #[serde(default)]
    pub fail_if_no_pr: bool,
    /// Delete the managed comment once there is nothing left to report.
    #[serde(default)]
    pub remove_previous_comments: bool,
}

fn default_report_id() -> String {
    "tripwire".into()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            id: default_report_id(),
            fail_on_errors: false,
            fail_if_no_pr: false,
            remove_previous_comments: false,
        }
    }
}

/// Which code-review host API to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostKind {
    /// Pick the host from the detected CI provider.
    #[default]
    Auto,
    /// GitHub (or GitHub Enterprise) REST API.
    GitHub,
    /// GitLab v4 REST API.
    GitLab,
}

impl FromStr for HostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(HostKind::Auto),
            "github" => Ok(HostKind::GitHub),
            "gitlab" => Ok(HostKind::GitLab),
            other => Err(format!("unknown host kind: {other}")),
        }
    }
}

/// Code-review host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host API flavour (default: auto).
    #[serde(default)]
    pub kind: HostKind,
    /// Custom API base URL (GitHub Enterprise, self-managed GitLab).
    pub api_url: Option<String>,
}

/// Bounded retry policy for host API calls.
///
/// # Examples
///
/// ```
/// use tripwire_core::RetryConfig;
///
/// let config = RetryConfig::default();
/// assert_eq!(config.max_attempts, 3);
/// assert_eq!(config.base_delay_ms, 500);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per operation, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry; doubled for each further retry (default: 500).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}
