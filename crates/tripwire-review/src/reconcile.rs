use serde::Serialize;
use tracing::{info, warn};
use tripwire_core::{Annotation, TripwireError};
use tripwire_report::RenderedReport;

use crate::host::ReviewHost;
use crate::retry::RetryPolicy;

/// The single host mutation a run performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "action")]
pub enum Action {
    /// Post a new managed comment.
    Create {
        /// Comment body.
        body: String,
    },
    /// Replace the managed comment's body.
    Update {
        /// Id of the managed comment.
        id: String,
        /// New comment body.
        body: String,
    },
    /// Remove the managed comment.
    Delete {
        /// Id of the managed comment.
        id: String,
    },
    /// Leave the host untouched.
    NoOp,
}

impl Action {
    /// Short name used in logs and summaries.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Create { .. } => "create",
            Action::Update { .. } => "update",
            Action::Delete { .. } => "delete",
            Action::NoOp => "no-op",
        }
    }
}

/// The earliest comment carrying `marker`, if any.
///
/// More than one match means another writer or a manual copy of the marker;
/// the earliest comment stays authoritative and the rest are left alone.
pub fn find_managed<'a>(existing: &'a [Annotation], marker: &str) -> Option<&'a Annotation> {
    let mut matches = existing.iter().filter(|a| a.body.contains(marker));
    let managed = matches.next()?;
    let extra: Vec<&str> = matches.map(|a| a.id.as_str()).collect();
    if !extra.is_empty() {
        warn!(
            managed = %managed.id,
            ignored = ?extra,
            "found more than one managed comment, using the earliest"
        );
    }
    Some(managed)
}

/// Decide what to do with the managed comment.
///
/// # Examples
///
/// ```
/// use tripwire_core::{Annotation, FindingsSet};
/// use tripwire_report::{render, ReportId};
/// use tripwire_review::reconcile::{reconcile, Action};
///
/// let report = render(&FindingsSet::default(), "", "", &ReportId::new("tripwire").unwrap());
/// let existing = vec![Annotation { id: "12".into(), body: report.body.clone() }];
///
/// assert_eq!(reconcile(&existing, &report, true), Action::Delete { id: "12".into() });
/// assert_eq!(reconcile(&[], &report, true), Action::NoOp);
/// ```
pub fn reconcile(existing: &[Annotation], report: &RenderedReport, remove_previous: bool) -> Action {
    match (find_managed(existing, &report.marker), report.has_findings) {
        (None, true) => Action::Create {
            body: report.body.clone(),
        },
        (None, false) => Action::NoOp,
        (Some(managed), false) if remove_previous => Action::Delete {
            id: managed.id.clone(),
        },
        (Some(managed), _) => Action::Update {
            id: managed.id.clone(),
            body: report.body.clone(),
        },
    }
}

/// Perform `action` on the host, retrying transient failures.
///
/// # Errors
///
/// Returns [`TripwireError::FatalNetwork`] if the host call fails permanently.
pub async fn apply(
    host: &dyn ReviewHost,
    pr: &str,
    action: &Action,
    retry: &RetryPolicy,
) -> Result<(), TripwireError> {
    match action {
        Action::Create { body } => {
            let created = retry
                .run("create comment", || host.create_comment(pr, body))
                .await?;
            info!(pr, id = %created.id, "created report comment");
        }
        Action::Update { id, body } => {
            retry
                .run("update comment", || host.update_comment(pr, id, body))
                .await?;
            info!(pr, id = %id, "updated report comment");
        }
        Action::Delete { id } => {
            retry
                .run("delete comment", || host.delete_comment(pr, id))
                .await?;
            info!(pr, id = %id, "deleted report comment");
        }
        Action::NoOp => info!(pr, "nothing to report and no previous comment"),
    }
    Ok(())
}
