use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TripwireError;

/// Classification of a finding.
///
/// Variants are declared in report order: errors, then warnings, then messages.
///
/// # Examples
///
/// ```
/// use tripwire_core::FindingKind;
///
/// let kind: FindingKind = "warning".parse().unwrap();
/// assert_eq!(kind, FindingKind::Warning);
/// assert_eq!(FindingKind::ALL[0], FindingKind::Error);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingKind {
    /// A problem that should block the change.
    Error,
    /// A problem worth a look.
    Warning,
    /// Informational note.
    Message,
}

impl FindingKind {
    /// All kinds in report order.
    pub const ALL: [FindingKind; 3] = [FindingKind::Error, FindingKind::Warning, FindingKind::Message];

    /// Singular noun used in table headers and status lines.
    pub fn noun(self) -> &'static str {
        match self {
            FindingKind::Error => "Error",
            FindingKind::Warning => "Warning",
            FindingKind::Message => "Message",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::Error => write!(f, "error"),
            FindingKind::Warning => write!(f, "warning"),
            FindingKind::Message => write!(f, "message"),
        }
    }
}

impl FromStr for FindingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" | "errors" => Ok(FindingKind::Error),
            "warning" | "warnings" => Ok(FindingKind::Warning),
            "message" | "messages" => Ok(FindingKind::Message),
            other => Err(format!("unknown finding kind: {other}")),
        }
    }
}

/// One reported issue or note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity class of the finding.
    pub kind: FindingKind,
    /// Text shown in the report.
    pub text: String,
}

impl Finding {
    /// Create a finding of the given kind.
    pub fn new(kind: FindingKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Findings grouped by kind, keeping insertion order within each kind.
///
/// # Examples
///
/// ```
/// use tripwire_core::{Finding, FindingKind, FindingsSet};
///
/// let mut findings = FindingsSet::default();
/// findings.push(Finding::new(FindingKind::Warning, "my warning"));
/// findings.push(Finding::new(FindingKind::Error, "some error"));
///
/// assert!(findings.has_errors());
/// assert_eq!(findings.count(FindingKind::Warning), 1);
/// let order: Vec<_> = findings.iter().map(|f| f.kind).collect();
/// assert_eq!(order, vec![FindingKind::Error, FindingKind::Warning]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindingsSet {
    errors: Vec<String>,
    warnings: Vec<String>,
    messages: Vec<String>,
}

impl FindingsSet {
    /// Build a set from per-kind lists of text.
    pub fn new(errors: Vec<String>, warnings: Vec<String>, messages: Vec<String>) -> Self {
        Self {
            errors,
            warnings,
            messages,
        }
    }

    /// Append a finding after the existing findings of the same kind.
    pub fn push(&mut self, finding: Finding) {
        self.bucket_mut(finding.kind).push(finding.text);
    }

    /// Texts of one kind, in insertion order.
    pub fn texts(&self, kind: FindingKind) -> &[String] {
        match kind {
            FindingKind::Error => &self.errors,
            FindingKind::Warning => &self.warnings,
            FindingKind::Message => &self.messages,
        }
    }

    /// Number of findings of one kind.
    pub fn count(&self, kind: FindingKind) -> usize {
        self.texts(kind).len()
    }

    /// `true` when any error finding is present.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// `true` when there is nothing of any kind to report.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.messages.is_empty()
    }

    /// All findings: errors, then warnings, then messages.
    pub fn iter(&self) -> impl Iterator<Item = Finding> + '_ {
        FindingKind::ALL.into_iter().flat_map(move |kind| {
            self.texts(kind)
                .iter()
                .map(move |text| Finding::new(kind, text.clone()))
        })
    }

    /// Parse the findings document written by analysis steps.
    ///
    /// The document is an object with optional `errors`, `warnings` and
    /// `messages` arrays. Each entry is either a string or an object with a
    /// `message` and an optional `file`/`line` location.
    ///
    /// # Errors
    ///
    /// Returns [`TripwireError::Serialization`] if the JSON does not match.
    ///
    /// # Examples
    ///
    /// ```
    /// use tripwire_core::{FindingKind, FindingsSet};
    ///
    /// let json = r#"{
    ///     "warnings": ["my warning", {"message": "unused import", "file": "src/lib.rs", "line": 3}]
    /// }"#;
    /// let findings = FindingsSet::from_json(json).unwrap();
    /// assert_eq!(findings.texts(FindingKind::Warning)[1], "unused import (`src/lib.rs:3`)");
    /// ```
    pub fn from_json(content: &str) -> Result<Self, TripwireError> {
        let document: FindingsDocument = serde_json::from_str(content)?;
        Ok(Self {
            errors: document.errors.into_iter().map(FindingEntry::into_text).collect(),
            warnings: document.warnings.into_iter().map(FindingEntry::into_text).collect(),
            messages: document.messages.into_iter().map(FindingEntry::into_text).collect(),
        })
    }

    fn bucket_mut(&mut self, kind: FindingKind) -> &mut Vec<String> {
        match kind {
            FindingKind::Error => &mut self.errors,
            FindingKind::Warning => &mut self.warnings,
            FindingKind::Message => &mut self.messages,
        }
    }
}

impl FromIterator<Finding> for FindingsSet {
    fn from_iter<I: IntoIterator<Item = Finding>>(iter: I) -> Self {
        let mut set = FindingsSet::default();
        for finding in iter {
            set.push(finding);
        }
        set
    }
}

#[derive(Deserialize)]
struct FindingsDocument {
    #[serde(default)]
    errors: Vec<FindingEntry>,
    #[serde(default)]
    warnings: Vec<FindingEntry>,
    #[serde(default)]
    messages: Vec<FindingEntry>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FindingEntry {
    Text(String),
    Located {
        message: String,
        file: Option<String>,
        line: Option<u32>,
    },
}

impl FindingEntry {
    fn into_text(self) -> String {
        match self {
            FindingEntry::Text(text) => text,
            FindingEntry::Located {
                message,
                file: Some(file),
                line: Some(line),
            } => format!("{message} (`{file}:{line}`)"),
            FindingEntry::Located {
                message,
                file: Some(file),
                line: None,
            } => format!("{message} (`{file}`)"),
            FindingEntry::Located { message, .. } => message,
        }
    }
}

/// Where and for what the current job is running.
///
/// Built once by the context resolver and passed by reference to every later
/// step of the run.
///
/// # Examples
///
/// ```
/// use tripwire_core::ExecutionContext;
///
/// let ctx = ExecutionContext {
///     provider_name: "CircleCI".into(),
///     is_pull_request: true,
///     pr_identifier: "artsy/eigen#800".into(),
///     base_commit: "2525245".into(),
///     head_commit: "90528352".into(),
/// };
/// assert!(ctx.is_pull_request);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionContext {
    /// Name of the detected CI provider.
    pub provider_name: String,
    /// Whether the job runs for a pull/merge request.
    pub is_pull_request: bool,
    /// Host-specific request reference (`owner/repo#123`, `group/project!42`).
    pub pr_identifier: String,
    /// Base commit of the request; empty when unknown.
    pub base_commit: String,
    /// Head commit of the request; empty when unknown.
    pub head_commit: String,
}

/// A comment that already exists on the code-review host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Host-assigned comment id.
    pub id: String,
    /// Raw comment body.
    pub body: String,
}

/// Output format for CLI subcommands.
///
/// # Examples
///
/// ```
/// use tripwire_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
