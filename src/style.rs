//! Terminal styling for user-facing lines.
//!
//! Callers hand over plain text and a semantic style; whether escape codes
//! are emitted is decided once from `--color` and passed in.

/// What a line means to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    /// Everything went through.
    Success,
    /// Run skipped or something worth a second look.
    Warning,
    /// The job is going to fail.
    Error,
    /// Neutral detail.
    Info,
}

impl Style {
    fn code(self) -> &'static str {
        match self {
            Style::Success => "\x1b[32m",
            Style::Warning => "\x1b[33m",
            Style::Error => "\x1b[31m",
            Style::Info => "\x1b[36m",
        }
    }
}

/// Wrap `text` in the escape codes for `style`, or return it unchanged.
pub fn paint(text: &str, style: Style, use_color: bool) -> String {
    if use_color {
        format!("{}{text}\x1b[0m", style.code())
    } else {
        text.to_string()
    }
}

/// Style for a status line: green when clean, yellow for warnings only.
pub fn for_status(has_errors: bool, has_warnings: bool) -> Style {
    if has_errors {
        Style::Error
    } else if has_warnings {
        Style::Warning
    } else {
        Style::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_without_color() {
        assert_eq!(paint("All green.", Style::Success, false), "All green.");
    }

    #[test]
    fn colored_text_is_reset() {
        let painted = paint("Not a Travis Pull Request", Style::Warning, true);
        assert!(painted.starts_with("\x1b[33m"));
        assert!(painted.ends_with("\x1b[0m"));
        assert!(painted.contains("Not a Travis Pull Request"));
    }

    #[test]
    fn status_style_follows_severity() {
        assert_eq!(for_status(true, true), Style::Error);
        assert_eq!(for_status(false, true), Style::Warning);
        assert_eq!(for_status(false, false), Style::Success);
    }
}
