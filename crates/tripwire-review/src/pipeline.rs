use tracing::info;
use tripwire_ci::{CiProvider, NotAPullRequest, Resolution};
use tripwire_core::{decide_exit, ExecutionContext, ExitDecision, FindingsSet, TripwireError};
use tripwire_report::{render, RenderedReport, ReportId};

use crate::host::{PullRequestMetadata, ReviewHost};
use crate::reconcile::{apply, reconcile, Action};
use crate::retry::RetryPolicy;

/// Policy flags and identity for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Identity folded into the comment marker.
    pub report_id: ReportId,
    /// Fail the job when any error finding is reported.
    pub fail_on_errors: bool,
    /// Fail the job when it is not building a pull request.
    pub fail_if_no_pr: bool,
    /// Delete the managed comment once there is nothing to report.
    pub remove_previous_comments: bool,
}

/// Everything a run produced, for the caller to print.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Exit decision for the job.
    pub decision: ExitDecision,
    /// Set when the run stopped because the job is not building a pull request.
    pub skipped: Option<NotAPullRequest>,
    /// Context of the reviewed pull request.
    pub context: Option<ExecutionContext>,
    /// Rendered report.
    pub report: Option<RenderedReport>,
    /// Host mutation that was performed.
    pub action: Option<Action>,
    /// Labels on the pull request.
    pub labels: Vec<String>,
}

/// Run the reporting pipeline for an already resolved execution context.
///
/// When the job is not building a pull request the exit policy decides the
/// outcome straight away: `connect` is never called and nothing is rendered.
/// Otherwise the host is connected, pull request metadata and existing
/// comments are fetched together, the report is rendered and reconciled, and
/// exactly one host mutation (or none) is performed.
///
/// # Errors
///
/// Returns the error from `connect`, or [`TripwireError::FatalNetwork`] when a
/// host call fails permanently. Nothing is posted if the reads fail.
pub async fn execute<F>(
    resolution: Resolution,
    findings: &FindingsSet,
    options: &RunOptions,
    retry: &RetryPolicy,
    connect: F,
) -> Result<RunOutcome, TripwireError>
where
    F: FnOnce(CiProvider, &ExecutionContext) -> Result<Box<dyn ReviewHost>, TripwireError>,
{
    let (provider, context) = match resolution {
        Resolution::NotAPullRequest(signal) => {
            return Ok(RunOutcome {
                decision: decide_exit(
                    false,
                    options.fail_if_no_pr,
                    findings.has_errors(),
                    options.fail_on_errors,
                ),
                skipped: Some(signal),
                context: None,
                report: None,
                action: None,
                labels: Vec::new(),
            });
        }
        Resolution::PullRequest { provider, context } => (provider, context),
    };

    let host = connect(provider, &context)?;
    let pr = context.pr_identifier.as_str();

    // Both reads are retried together so the decision sees one snapshot.
    let (metadata, existing) = retry
        .run("fetch pull request", || async {
            tokio::try_join!(host.pull_request_metadata(pr), host.list_comments(pr))
        })
        .await?;

    let (base, head) = commits(&context, &metadata);
    let report = render(findings, base, head, &options.report_id);
    let action = reconcile(&existing, &report, options.remove_previous_comments);
    info!(pr, action = action.name(), status = %report.status_line, "reconciling report");
    apply(host.as_ref(), pr, &action, retry).await?;

    let decision = decide_exit(
        true,
        options.fail_if_no_pr,
        findings.has_errors(),
        options.fail_on_errors,
    );

    Ok(RunOutcome {
        decision,
        skipped: None,
        report: Some(report),
        action: Some(action),
        labels: metadata.labels,
        context: Some(context),
    })
}

/// Commits for the footer: context values first, host metadata as fallback.
fn commits<'a>(context: &'a ExecutionContext, metadata: &'a PullRequestMetadata) -> (&'a str, &'a str) {
    let pick = |own: &'a str, fetched: &'a str| if own.is_empty() { fetched } else { own };
    (
        pick(&context.base_commit, &metadata.base_sha),
        pick(&context.head_commit, &metadata.head_sha),
    )
}
