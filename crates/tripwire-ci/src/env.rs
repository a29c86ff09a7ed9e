use std::collections::BTreeMap;

/// Read-only snapshot of the CI job's environment variables.
///
/// Captured once at startup and passed by reference; nothing in the run
/// mutates it. Empty values are treated the same as unset ones, since CI
/// services commonly export blank variables.
///
/// # Examples
///
/// ```
/// use tripwire_ci::Environment;
///
/// let env: Environment = [("GITLAB_CI", "true"), ("CI_MERGE_REQUEST_IID", "")]
///     .into_iter()
///     .collect();
/// assert_eq!(env.get("GITLAB_CI"), Some("true"));
/// assert_eq!(env.get("CI_MERGE_REQUEST_IID"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Snapshot the current process environment.
    ///
    /// Variables that are not valid Unicode are skipped.
    pub fn from_process() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Value of `key`, or `None` when it is unset or blank.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// `true` when `key` is set to a non-blank value.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

impl<K, V> FromIterator<(K, V)> for Environment
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
