//! Deterministic rendering of findings into a report comment.
//!
//! Provides [`render`], which turns a findings set into a Markdown body with a
//! hidden identity marker, and [`status_line`], the one-line summary.

mod render;
mod status;

pub use render::{render, RenderedReport, ReportId};
pub use status::status_line;
