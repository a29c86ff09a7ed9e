use serde::Serialize;

/// Outcome of a run as seen by the CI job.
///
/// # Examples
///
/// ```
/// use tripwire_core::ExitDecision;
///
/// assert_eq!(ExitDecision::Success.exit_code(), 0);
/// assert_eq!(ExitDecision::SuccessNoOp.exit_code(), 0);
/// assert_eq!(ExitDecision::Failure.exit_code(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ExitDecision {
    /// The report was reconciled and policy allows the job to pass.
    Success,
    /// Nothing was done on purpose (not a pull request).
    SuccessNoOp,
    /// Policy requires the job to fail.
    Failure,
}

impl ExitDecision {
    /// Process exit code for this decision.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitDecision::Success | ExitDecision::SuccessNoOp => 0,
            ExitDecision::Failure => 1,
        }
    }
}

/// Map the run outcome and policy flags to an exit decision.
///
/// A job that is not running for a pull request is decided on `fail_if_no_pr`
/// alone; the findings are never consulted.
///
/// # Examples
///
/// ```
/// use tripwire_core::{decide_exit, ExitDecision};
///
/// assert_eq!(decide_exit(false, false, true, true), ExitDecision::SuccessNoOp);
/// assert_eq!(decide_exit(true, false, true, true), ExitDecision::Failure);
/// assert_eq!(decide_exit(true, false, true, false), ExitDecision::Success);
/// ```
pub fn decide_exit(
    is_pull_request: bool,
    fail_if_no_pr: bool,
    findings_have_errors: bool,
    fail_on_errors: bool,
) -> ExitDecision {
    if !is_pull_request {
        return if fail_if_no_pr {
            ExitDecision::Failure
        } else {
            ExitDecision::SuccessNoOp
        };
    }
    if findings_have_errors && fail_on_errors {
        ExitDecision::Failure
    } else {
        ExitDecision::Success
    }
}
