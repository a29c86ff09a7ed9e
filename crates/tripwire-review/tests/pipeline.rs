//! Integration tests: resolve → render → reconcile → exit policy against an in-memory host.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tripwire_ci::{CiProvider, CommitOverrides, Environment, Resolution};
use tripwire_core::{Annotation, ExitDecision, FindingsSet, TripwireError};
use tripwire_report::ReportId;
use tripwire_review::host::{PullRequestMetadata, ReviewHost};
use tripwire_review::pipeline::{execute, RunOptions, RunOutcome};
use tripwire_review::reconcile::Action;
use tripwire_review::retry::RetryPolicy;

#[derive(Default)]
struct State {
    comments: Vec<Annotation>,
    next_id: u64,
    reads: u32,
    creates: u32,
    updates: u32,
    deletes: u32,
    transient_list_failures: u32,
    fatal_list_failure: bool,
}

#[derive(Clone, Default)]
struct FakeHost {
    state: Arc<Mutex<State>>,
}

impl FakeHost {
    fn with_comments(comments: Vec<Annotation>) -> Self {
        let host = FakeHost::default();
        {
            let mut state = host.state.lock().unwrap();
            state.next_id = 100;
            state.comments = comments;
        }
        host
    }

    fn mutations(&self) -> u32 {
        let s = self.state.lock().unwrap();
        s.creates + s.updates + s.deletes
    }

    fn comments(&self) -> Vec<Annotation> {
        self.state.lock().unwrap().comments.clone()
    }
}

#[async_trait]
impl ReviewHost for FakeHost {
    async fn list_comments(&self, _pr: &str) -> Result<Vec<Annotation>, TripwireError> {
        let mut s = self.state.lock().unwrap();
        s.reads += 1;
        if s.fatal_list_failure {
            return Err(TripwireError::FatalNetwork("HTTP 403".into()));
        }
        if s.transient_list_failures > 0 {
            s.transient_list_failures -= 1;
            return Err(TripwireError::TransientNetwork("HTTP 502".into()));
        }
        Ok(s.comments.clone())
    }

    async fn create_comment(&self, _pr: &str, body: &str) -> Result<Annotation, TripwireError> {
        let mut s = self.state.lock().unwrap();
        s.creates += 1;
        s.next_id += 1;
        let comment = Annotation {
            id: s.next_id.to_string(),
            body: body.to_string(),
        };
        s.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(
        &self,
        _pr: &str,
        id: &str,
        body: &str,
    ) -> Result<Annotation, TripwireError> {
        let mut s = self.state.lock().unwrap();
        s.updates += 1;
        let comment = s
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| TripwireError::FatalNetwork("HTTP 404".into()))?;
        comment.body = body.to_string();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, _pr: &str, id: &str) -> Result<(), TripwireError> {
        let mut s = self.state.lock().unwrap();
        s.deletes += 1;
        s.comments.retain(|c| c.id != id);
        Ok(())
    }

    async fn pull_request_metadata(
        &self,
        _pr: &str,
    ) -> Result<PullRequestMetadata, TripwireError> {
        Ok(PullRequestMetadata {
            base_sha: "host-base".into(),
            head_sha: "host-head".into(),
            labels: vec!["D:2".into(), "Maintenance Work".into()],
        })
    }
}

fn pull_request_env() -> Environment {
    [
        ("CIRCLE_BUILD_NUM", "true"),
        ("CI_PULL_REQUEST", "https://github.com/artsy/eigen/pull/800"),
    ]
    .into_iter()
    .collect()
}

fn resolution(env: &Environment) -> Resolution {
    tripwire_ci::resolve(&CiProvider::PRIORITY, env, &CommitOverrides::default()).unwrap()
}

fn options(id: &str) -> RunOptions {
    RunOptions {
        report_id: ReportId::new(id).unwrap(),
        fail_on_errors: false,
        fail_if_no_pr: false,
        remove_previous_comments: false,
    }
}

fn retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::ZERO,
    }
}

fn warnings(texts: &[&str]) -> FindingsSet {
    FindingsSet::new(vec![], texts.iter().map(|t| t.to_string()).collect(), vec![])
}

async fn run(host: &FakeHost, findings: &FindingsSet, options: &RunOptions) -> RunOutcome {
    let host = host.clone();
    execute(
        resolution(&pull_request_env()),
        findings,
        options,
        &retry(),
        move |_, _| Ok(Box::new(host) as Box<dyn ReviewHost>),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn not_a_pull_request_never_contacts_the_host() {
    let env: Environment = [("CIRCLE_BUILD_NUM", "12")].into_iter().collect();
    let host = FakeHost::default();
    let connected = AtomicBool::new(false);

    let outcome = execute(
        resolution(&env),
        &FindingsSet::new(vec!["boom".into()], vec![], vec![]),
        &options("tripwire"),
        &retry(),
        |_, _| {
            connected.store(true, Ordering::SeqCst);
            Ok(Box::new(host.clone()) as Box<dyn ReviewHost>)
        },
    )
    .await
    .unwrap();

    assert_eq!(outcome.decision, ExitDecision::SuccessNoOp);
    assert!(!connected.load(Ordering::SeqCst));
    assert!(outcome.report.is_none());
    assert!(outcome.action.is_none());
    assert_eq!(host.state.lock().unwrap().reads, 0);
    assert_eq!(host.mutations(), 0);
    let skipped = outcome.skipped.unwrap();
    assert_eq!(skipped.provider_name, "CircleCI");
}

#[tokio::test]
async fn not_a_pull_request_fails_when_configured() {
    let env: Environment = [("GITLAB_CI", "true")].into_iter().collect();
    let opts = RunOptions {
        fail_if_no_pr: true,
        ..options("tripwire")
    };
    let outcome = execute(
        resolution(&env),
        &FindingsSet::default(),
        &opts,
        &retry(),
        |_, _| Err(TripwireError::Config("should not connect".into())),
    )
    .await
    .unwrap();
    assert_eq!(outcome.decision, ExitDecision::Failure);
    assert_eq!(outcome.skipped.unwrap().terminology, "Merge Request");
}

#[tokio::test]
async fn repeated_runs_converge_on_one_comment() {
    let host = FakeHost::with_comments(vec![Annotation {
        id: "1".into(),
        body: "Looks good to me".into(),
    }]);
    let findings = warnings(&["my warning", "second warning"]);
    let opts = options("tripwire");

    let first = run(&host, &findings, &opts).await;
    assert!(matches!(first.action, Some(Action::Create { .. })));

    let second = run(&host, &findings, &opts).await;
    assert!(matches!(second.action, Some(Action::Update { ref id, .. }) if id == "101"));

    let managed: Vec<_> = host
        .comments()
        .into_iter()
        .filter(|c| c.body.contains("generated_by_tripwire"))
        .collect();
    assert_eq!(managed.len(), 1);
    assert_eq!(host.comments().len(), 2);
    assert_eq!(second.decision, ExitDecision::Success);
}

#[tokio::test]
async fn cleared_findings_delete_when_asked() {
    let host = FakeHost::with_comments(vec![]);
    let opts = RunOptions {
        remove_previous_comments: true,
        ..options("tripwire")
    };
    run(&host, &warnings(&["hi"]), &opts).await;
    assert_eq!(host.comments().len(), 1);

    let outcome = run(&host, &FindingsSet::default(), &opts).await;
    assert!(matches!(outcome.action, Some(Action::Delete { .. })));
    assert!(host.comments().is_empty());
}

#[tokio::test]
async fn cleared_findings_leave_footer_only_comment_by_default() {
    let host = FakeHost::with_comments(vec![]);
    let opts = options("tripwire");
    run(&host, &warnings(&["hi"]), &opts).await;

    let outcome = run(&host, &FindingsSet::default(), &opts).await;
    assert!(matches!(outcome.action, Some(Action::Update { .. })));
    let comments = host.comments();
    assert_eq!(comments.len(), 1);
    assert!(comments[0].body.starts_with("<p align=\"right\""));
    assert!(!comments[0].body.contains("&nbsp;"));
}

#[tokio::test]
async fn nothing_to_say_and_nothing_posted_is_a_no_op() {
    let host = FakeHost::with_comments(vec![]);
    let outcome = run(&host, &FindingsSet::default(), &options("tripwire")).await;
    assert_eq!(outcome.action, Some(Action::NoOp));
    assert_eq!(host.mutations(), 0);
    assert_eq!(outcome.decision, ExitDecision::Success);
}

#[tokio::test]
async fn independent_ids_keep_separate_comments() {
    let host = FakeHost::with_comments(vec![]);
    let findings = warnings(&["shared text"]);

    run(&host, &findings, &options("lint")).await;
    let strict = run(&host, &findings, &options("lint-strict")).await;
    assert!(matches!(strict.action, Some(Action::Create { .. })));
    assert_eq!(host.comments().len(), 2);

    let again = run(&host, &findings, &options("lint")).await;
    assert!(matches!(again.action, Some(Action::Update { ref id, .. }) if id == "101"));
    assert_eq!(host.comments().len(), 2);
}

#[tokio::test]
async fn errors_fail_the_job_only_when_asked() {
    let host = FakeHost::with_comments(vec![]);
    let findings = FindingsSet::new(vec!["some error".into()], vec!["my warning".into()], vec![]);

    let lenient = run(&host, &findings, &options("tripwire")).await;
    assert_eq!(lenient.decision, ExitDecision::Success);

    let strict = RunOptions {
        fail_on_errors: true,
        ..options("tripwire")
    };
    let outcome = run(&host, &findings, &strict).await;
    assert_eq!(outcome.decision, ExitDecision::Failure);
    // the comment is still kept in sync
    assert!(matches!(outcome.action, Some(Action::Update { .. })));
    let report = outcome.report.unwrap();
    let errors_at = report.body.find("1 Error").unwrap();
    let warnings_at = report.body.find("1 Warning").unwrap();
    assert!(errors_at < warnings_at);
    assert_eq!(
        report.status_line,
        "⚠ 1 Error. 1 Warning. Don't worry, everything is fixable."
    );
}

#[tokio::test]
async fn host_metadata_fills_commits_and_labels() {
    let host = FakeHost::with_comments(vec![]);
    let outcome = run(&host, &warnings(&["w"]), &options("tripwire")).await;
    let body = &outcome.report.unwrap().body;
    assert!(body.contains("data-base-commit=\"host-base\""));
    assert!(body.contains("data-head-commit=\"host-head\""));
    assert_eq!(outcome.labels, vec!["D:2", "Maintenance Work"]);
    assert_eq!(outcome.context.unwrap().pr_identifier, "artsy/eigen#800");
}

#[tokio::test]
async fn transient_read_failures_are_retried() {
    let host = FakeHost::with_comments(vec![]);
    host.state.lock().unwrap().transient_list_failures = 2;

    let outcome = run(&host, &warnings(&["w"]), &options("tripwire")).await;
    assert!(matches!(outcome.action, Some(Action::Create { .. })));
    assert_eq!(host.state.lock().unwrap().reads, 3);
    assert_eq!(host.mutations(), 1);
}

#[tokio::test]
async fn failed_reads_post_nothing() {
    let host = FakeHost::with_comments(vec![]);
    host.state.lock().unwrap().fatal_list_failure = true;
    let connect_host = host.clone();

    let result = execute(
        resolution(&pull_request_env()),
        &warnings(&["w"]),
        &options("tripwire"),
        &retry(),
        move |_, _| Ok(Box::new(connect_host) as Box<dyn ReviewHost>),
    )
    .await;

    assert!(matches!(result, Err(TripwireError::FatalNetwork(_))));
    assert_eq!(host.mutations(), 0);
    assert_eq!(host.state.lock().unwrap().reads, 1);
}

#[tokio::test]
async fn exhausted_retries_abort_the_run() {
    let host = FakeHost::with_comments(vec![]);
    host.state.lock().unwrap().transient_list_failures = 10;
    let connect_host = host.clone();

    let result = execute(
        resolution(&pull_request_env()),
        &warnings(&["w"]),
        &options("tripwire"),
        &retry(),
        move |_, _| Ok(Box::new(connect_host) as Box<dyn ReviewHost>),
    )
    .await;

    assert!(matches!(result, Err(TripwireError::FatalNetwork(_))));
    assert_eq!(host.state.lock().unwrap().reads, 3);
    assert_eq!(host.mutations(), 0);
}
