use std::fmt::Write;

use serde::Serialize;
use tripwire_core::{FindingKind, FindingsSet, TripwireError};

use crate::status::{counted, status_line};

const HOMEPAGE: &str = "https://github.com/tripwire-ci/tripwire";

/// Identity of a report, folded into the hidden marker of every comment it posts.
///
/// Two reports with different ids never claim each other's comments, so several
/// independent tripwire jobs can report on the same pull request.
///
/// # Examples
///
/// ```
/// use tripwire_report::ReportId;
///
/// let id = ReportId::new("lint").unwrap();
/// assert_eq!(id.marker(), r#"data-meta="generated_by_lint""#);
/// assert!(ReportId::new("").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportId(String);

impl ReportId {
    /// Validate and wrap a report id.
    ///
    /// # Errors
    ///
    /// Returns [`TripwireError::RenderInvariant`] if the id is empty or contains
    /// anything other than ASCII letters, digits, `-`, `_` or `.`.
    pub fn new(id: &str) -> Result<Self, TripwireError> {
        if id.is_empty() {
            return Err(TripwireError::RenderInvariant(
                "report id must not be empty".into(),
            ));
        }
        if let Some(bad) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(TripwireError::RenderInvariant(format!(
                "report id '{id}' contains unsupported character {bad:?}"
            )));
        }
        Ok(Self(id.to_string()))
    }

    /// The id as given.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substring that identifies comments posted under this id.
    ///
    /// The closing quote is part of the marker, so `lint` never matches a
    /// comment posted as `lint-strict`.
    pub fn marker(&self) -> String {
        format!("data-meta=\"generated_by_{}\"", self.0)
    }
}

/// A rendered report, ready to be reconciled against the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedReport {
    /// Markdown comment body, footer included.
    pub body: String,
    /// Short summary line.
    pub status_line: String,
    /// Identity marker embedded in `body`.
    pub marker: String,
    /// `false` when the body is only the footer.
    pub has_findings: bool,
}

/// Render findings into a comment body.
///
/// Errors, warnings and messages each get a two-column table, in that order,
/// skipping kinds with no findings. The footer carrying the marker and the
/// commits is always last. The output depends on the arguments alone.
///
/// # Examples
///
/// ```
/// use tripwire_core::FindingsSet;
/// use tripwire_report::{render, ReportId};
///
/// let id = ReportId::new("tripwire").unwrap();
/// let report = render(&FindingsSet::default(), "", "", &id);
/// assert!(!report.has_findings);
/// assert!(report.body.starts_with("<p align=\"right\""));
/// assert!(report.body.contains(&report.marker));
/// ```
pub fn render(findings: &FindingsSet, base_commit: &str, head_commit: &str, id: &ReportId) -> RenderedReport {
    let tables: Vec<String> = FindingKind::ALL
        .into_iter()
        .filter(|kind| findings.count(*kind) > 0)
        .map(|kind| table(kind, findings.texts(kind)))
        .collect();

    let mut body = tables.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    body.push_str(&footer(id, base_commit, head_commit));

    RenderedReport {
        body,
        status_line: status_line(findings),
        marker: id.marker(),
        has_findings: !findings.is_empty(),
    }
}

fn glyph(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::Error => ":no_entry_sign:",
        FindingKind::Warning => ":warning:",
        FindingKind::Message => ":book:",
    }
}

fn table(kind: FindingKind, texts: &[String]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "&nbsp; | {}", counted(texts.len(), kind));
    out.push_str("------------- | ------------\n");
    for text in texts {
        let _ = writeln!(out, "{} | {}", glyph(kind), escape_cell(text));
    }
    out
}

fn footer(id: &ReportId, base_commit: &str, head_commit: &str) -> String {
    format!(
        "<p align=\"right\" {} data-base-commit=\"{}\" data-head-commit=\"{}\">\n  \
         Generated by :no_entry_sign: <a href=\"{HOMEPAGE}\">tripwire</a>\n\
         </p>\n",
        id.marker(),
        escape_attr(base_commit),
        escape_attr(head_commit),
    )
}

/// Keep a finding inside its table row.
fn escape_cell(text: &str) -> String {
    text.trim()
        .replace('|', "\\|")
        .replace("\r\n", "<br />")
        .replace('\n', "<br />")
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
