use tripwire_core::{FindingKind, FindingsSet};

const ALL_GREEN: &str = "All green. Well done.";
const ENCOURAGEMENT: &str = "Don't worry, everything is fixable.";

/// One-line summary of a findings set, suitable for a commit status.
///
/// Messages never affect the summary.
///
/// # Examples
///
/// ```
/// use tripwire_core::FindingsSet;
/// use tripwire_report::status_line;
///
/// let findings = FindingsSet::new(vec!["e".into()], vec![], vec![]);
/// assert_eq!(status_line(&findings), "⚠ 1 Error. Don't worry, everything is fixable.");
/// assert!(status_line(&FindingsSet::default()).starts_with("All green."));
/// ```
pub fn status_line(findings: &FindingsSet) -> String {
    let errors = findings.count(FindingKind::Error);
    let warnings = findings.count(FindingKind::Warning);
    if errors == 0 && warnings == 0 {
        return ALL_GREEN.to_string();
    }

    let mut line = String::from("⚠ ");
    if errors > 0 {
        line.push_str(&counted(errors, FindingKind::Error));
        line.push_str(". ");
    }
    if warnings > 0 {
        line.push_str(&counted(warnings, FindingKind::Warning));
        line.push_str(". ");
    }
    line.push_str(ENCOURAGEMENT);
    line
}

/// `"1 Warning"`, `"2 Warnings"`.
pub(crate) fn counted(count: usize, kind: FindingKind) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {}{suffix}", kind.noun())
}
