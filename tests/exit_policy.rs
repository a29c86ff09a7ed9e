use tripwire_core::{decide_exit, ExitDecision};

#[test]
fn not_a_pull_request_is_a_quiet_no_op() {
    let decision = decide_exit(false, false, true, true);
    assert_eq!(decision, ExitDecision::SuccessNoOp);
    assert_eq!(decision.exit_code(), 0);
}

#[test]
fn not_a_pull_request_fails_when_required() {
    // findings are irrelevant once the job is not building a pull request
    assert_eq!(decide_exit(false, true, false, false), ExitDecision::Failure);
    assert_eq!(decide_exit(false, true, true, true).exit_code(), 1);
}

#[test]
fn errors_fail_only_with_fail_on_errors() {
    assert_eq!(decide_exit(true, false, true, true), ExitDecision::Failure);
    assert_eq!(decide_exit(true, false, true, false), ExitDecision::Success);
}

#[test]
fn clean_pull_request_succeeds_regardless_of_flags() {
    for fail_if_no_pr in [false, true] {
        for fail_on_errors in [false, true] {
            let decision = decide_exit(true, fail_if_no_pr, false, fail_on_errors);
            assert_eq!(decision, ExitDecision::Success);
            assert_eq!(decision.exit_code(), 0);
        }
    }
}
