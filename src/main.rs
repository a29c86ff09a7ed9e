mod style;

use std::io::IsTerminal;
use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use tripwire_ci::{CiProvider, CommitOverrides, Environment, Resolution};
use tripwire_core::{FindingKind, FindingsSet, HostKind, OutputFormat, TripwireConfig};
use tripwire_report::{render, ReportId};
use tripwire_review::pipeline::{execute, RunOptions, RunOutcome};
use tripwire_review::reconcile::Action;
use tripwire_review::retry::RetryPolicy;

use crate::style::{paint, Style};

const CONFIG_FILE: &str = ".tripwire.toml";

#[derive(Parser)]
#[command(
    name = "tripwire",
    version,
    about = "Report CI findings on your pull request as one self-updating comment",
    long_about = "Tripwire runs inside a CI job, works out whether the job builds a pull or\n\
                   merge request, and keeps a single report comment on it in sync with the\n\
                   findings your lint and analysis steps produced.\n\n\
                   Examples:\n  \
                     tripwire run --findings findings.json    Post or update the report\n  \
                     linter --json | tripwire run              Read findings from stdin\n  \
                     tripwire preview --findings f.json        Render the comment locally\n  \
                     tripwire doctor                           Check CI detection and tokens"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .tripwire.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text  Human-readable summary (default)\n  \
                         json  Machine-readable JSON with camelCase keys"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Args)]
struct ReportArgs {
    /// Findings JSON file (default: read stdin)
    #[arg(
        long,
        long_help = "Findings JSON file.\n\n\
            Expected shape: {\"errors\": [...], \"warnings\": [...], \"messages\": [...]}.\n\
            Each entry is a string or {\"message\": ..., \"file\": ..., \"line\": ...}.\n\
            Reads stdin when omitted."
    )]
    findings: Option<PathBuf>,

    /// Base commit to record in the report (overrides the CI provider)
    #[arg(long)]
    base: Option<String>,

    /// Head commit to record in the report (overrides the CI provider)
    #[arg(long)]
    head: Option<String>,

    /// Identity of the report comment (default: [report].id or "tripwire")
    #[arg(
        long,
        visible_alias = "danger-id",
        long_help = "Identity of the report comment.\n\n\
            Runs with different ids keep separate comments on the same pull request.\n\
            Allowed characters: ASCII letters, digits, '-', '_' and '.'."
    )]
    report_id: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Post, update or remove the report comment for this CI job
    #[command(long_about = "Post, update or remove the report comment for this CI job.\n\n\
        Detects the CI provider from the environment. Jobs that are not building a\n\
        pull request exit early without contacting the host. Otherwise the findings\n\
        are rendered and the managed comment is created, updated or deleted.\n\n\
        Examples:\n  tripwire run --findings findings.json\n  tripwire run --fail-on-errors --remove-previous-comments < findings.json")]
    Run {
        #[command(flatten)]
        report: ReportArgs,

        /// Exit with status 1 when any error finding is reported
        #[arg(long, overrides_with = "no_fail_on_errors")]
        fail_on_errors: bool,

        /// Do not fail on error findings, even if the config says so
        #[arg(long, overrides_with = "fail_on_errors")]
        no_fail_on_errors: bool,

        /// Exit with status 1 when the job is not building a pull request
        #[arg(long, overrides_with = "no_fail_if_no_pr")]
        fail_if_no_pr: bool,

        /// Do not fail outside a pull request, even if the config says so
        #[arg(long, overrides_with = "fail_if_no_pr")]
        no_fail_if_no_pr: bool,

        /// Delete the report comment once there is nothing left to report
        #[arg(long, overrides_with = "no_remove_previous_comments")]
        remove_previous_comments: bool,

        /// Keep the report comment when there is nothing left to report
        #[arg(long, overrides_with = "remove_previous_comments")]
        no_remove_previous_comments: bool,
    },
    /// Render the report locally without contacting any host
    #[command(long_about = "Render the report locally without contacting any host.\n\n\
        Prints the comment body and status line, or the full rendered report with\n\
        --format json.\n\n\
        Example:\n  tripwire preview --findings findings.json --base abc123 --head def456")]
    Preview {
        #[command(flatten)]
        report: ReportArgs,
    },
    /// Create a default .tripwire.toml configuration file
    #[command(long_about = "Create a default .tripwire.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .tripwire.toml already exists.")]
    Init,
    /// Check CI detection, pull request detection and host tokens
    #[command(long_about = "Check CI detection, pull request detection and host tokens.\n\n\
        Runs the same detection as `tripwire run` without touching the host.\n\
        Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");
    let cmd = |name: &str| paint(name, Style::Info, use_color);

    println!("tripwire v{version} - one self-updating CI report per pull request\n");

    println!("Quick start:");
    println!("  {}                      Create a .tripwire.toml config file", cmd("tripwire init"));
    println!("  {}                    Check CI detection and tokens", cmd("tripwire doctor"));
    println!("  {}  Post the report from a CI job\n", cmd("tripwire run --findings f.json"));

    println!("All commands:");
    println!("  {}      Post, update or remove the report comment", cmd("run"));
    println!("  {}  Render the report locally", cmd("preview"));
    println!("  {}   Check your setup and environment", cmd("doctor"));
    println!("  {}     Create default configuration\n", cmd("init"));

    println!("Run 'tripwire <command> --help' for details.");
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_env("TRIPWIRE_LOG").unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init()
        .ok();
}

fn load_config(path: Option<&Path>) -> Result<TripwireConfig> {
    match path {
        Some(path) => TripwireConfig::from_file(path)
            .wrap_err(format!("loading {}", path.display())),
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                Ok(TripwireConfig::from_file(default_path).wrap_err("loading .tripwire.toml")?)
            } else {
                Ok(TripwireConfig::default())
            }
        }
    }
}

fn read_findings(file: Option<&Path>) -> Result<FindingsSet> {
    let input = match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display()))?,
        // Nothing is piped in when stdin is a terminal.
        None if std::io::stdin().is_terminal() => String::new(),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            input
        }
    };
    if input.trim().is_empty() {
        if file.is_none() {
            tracing::warn!(
                "no findings on stdin; pass --findings or pipe a findings document. Reporting an empty set"
            );
        }
        return Ok(FindingsSet::default());
    }
    Ok(FindingsSet::from_json(&input).wrap_err("parsing findings")?)
}

/// A `--flag`/`--no-flag` pair over a config value; the command line wins.
fn layered(on: bool, off: bool, config: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => config,
    }
}

fn report_id(flag: Option<&str>, config: &TripwireConfig) -> Result<ReportId> {
    Ok(ReportId::new(flag.unwrap_or(&config.report.id))?)
}

fn host_name(kind: HostKind) -> &'static str {
    match kind {
        HostKind::Auto => "auto",
        HostKind::GitHub => "github",
        HostKind::GitLab => "gitlab",
    }
}

fn print_status(findings: &FindingsSet, status_line: &str, use_color: bool) {
    let style = style::for_status(
        findings.has_errors(),
        findings.count(FindingKind::Warning) > 0,
    );
    println!("{}", paint(status_line, style, use_color));
}

fn print_outcome(
    outcome: &RunOutcome,
    findings: &FindingsSet,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "decision": outcome.decision,
            "exitCode": outcome.decision.exit_code(),
            "skipped": outcome.skipped.as_ref().map(|s| s.message()),
            "context": outcome.context,
            "report": outcome.report,
            "action": outcome.action,
            "labels": outcome.labels,
        });
        println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        return Ok(());
    }

    if let Some(signal) = &outcome.skipped {
        eprintln!("{}", paint(&signal.message(), Style::Warning, use_color));
        return Ok(());
    }
    if let (Some(report), Some(context)) = (&outcome.report, &outcome.context) {
        print_status(findings, &report.status_line, use_color);
        let pr = &context.pr_identifier;
        let summary = match &outcome.action {
            Some(Action::Create { .. }) => format!("Posted report comment on {pr}"),
            Some(Action::Update { id, .. }) => format!("Updated report comment {id} on {pr}"),
            Some(Action::Delete { id }) => format!("Removed report comment {id} from {pr}"),
            Some(Action::NoOp) | None => format!("Nothing to report on {pr}"),
        };
        println!("{}", paint(&summary, Style::Info, use_color));
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self, use_color: bool) -> String {
        let (glyph, style) = match self.status {
            "pass" => ("\u{2713}", Style::Success),
            "fail" => ("\u{2717}", Style::Error),
            _ => ("~", Style::Warning),
        };
        paint(glyph, style, use_color)
    }
}

fn doctor_checks(config: &TripwireConfig, config_found: bool, env: &Environment) -> Vec<CheckResult> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    if config_found {
        checks.push(CheckResult::pass(
            "config_file",
            format!("{CONFIG_FILE} found (report id: {})", config.report.id),
        ));
    } else {
        checks.push(CheckResult::info(
            "config_file",
            format!("{CONFIG_FILE} not found, using defaults"),
        ));
    }

    // 2. Report id
    match ReportId::new(&config.report.id) {
        Ok(id) => checks.push(CheckResult::pass("report_id", id.as_str().to_string())),
        Err(e) => checks.push(CheckResult::fail(
            "report_id",
            e.to_string(),
            "use ASCII letters, digits, '-', '_' or '.' in [report].id",
        )),
    }

    // 3. CI provider
    let provider = match tripwire_ci::detect_provider(&CiProvider::PRIORITY, env) {
        Ok(provider) => {
            checks.push(CheckResult::pass("ci_provider", provider.name()));
            provider
        }
        Err(_) => {
            checks.push(CheckResult::fail(
                "ci_provider",
                "no supported CI detected",
                "run inside GitHub Actions, GitLab CI, CircleCI, Travis CI or Jenkins",
            ));
            return checks;
        }
    };

    // 4. Pull request
    match tripwire_ci::resolve(&[provider], env, &CommitOverrides::default()) {
        Ok(Resolution::PullRequest { context, .. }) => {
            let commit = |c: &str| if c.is_empty() { "from host".to_string() } else { c.to_string() };
            checks.push(CheckResult::pass(
                "pull_request",
                format!(
                    "{} (base: {}, head: {})",
                    context.pr_identifier,
                    commit(&context.base_commit),
                    commit(&context.head_commit)
                ),
            ));
        }
        Ok(Resolution::NotAPullRequest(signal)) => {
            checks.push(CheckResult::info(
                "pull_request",
                format!("not a {} {}", signal.provider_name, signal.terminology),
            ));
        }
        Err(e) => checks.push(CheckResult::fail("pull_request", e.to_string(), "check CI variables")),
    }

    // 5. Host and token
    let kind = tripwire_review::connect::select_host(config.host.kind, provider);
    let url = tripwire_review::connect::api_url(kind, &config.host, env);
    checks.push(CheckResult::pass(
        "review_host",
        match url {
            Some(url) => format!("{} ({url})", host_name(kind)),
            None => host_name(kind).to_string(),
        },
    ));
    let token_vars: &[&str] = match kind {
        HostKind::GitLab => &["GITLAB_TOKEN"],
        _ => &["GITHUB_TOKEN", "GH_TOKEN"],
    };
    match token_vars.iter().find(|v| env.has(v)) {
        Some(var) => checks.push(CheckResult::pass("host_token", format!("{var} set"))),
        None => checks.push(CheckResult::fail(
            "host_token",
            format!("{} not set", token_vars[0]),
            format!("export {}=... in the CI job", token_vars[0]),
        )),
    }

    checks
}

fn run_doctor(
    config: &TripwireConfig,
    config_found: bool,
    format: OutputFormat,
    use_color: bool,
) -> Result<()> {
    let env = Environment::from_process();
    let checks = doctor_checks(config, config_found, &env);

    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        OutputFormat::Text => {
            let version = env!("CARGO_PKG_VERSION");
            println!("tripwire v{version} - Environment Check\n");

            for check in &checks {
                let label = check.name.replace('_', " ");
                println!("  {} {label:<20} {}", check.symbol(use_color), check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# Tripwire Configuration
# See: https://github.com/tripwire-ci/tripwire

[report]
# Identity of the report comment; runs with different ids keep separate comments
# id = "tripwire"
# fail_on_errors = false
# fail_if_no_pr = false
# remove_previous_comments = false

[host]
# auto picks GitLab for GitLab CI jobs and GitHub for everything else
# kind = "auto"
# api_url = "https://github.example.com/api/v3"

[retry]
# max_attempts = 3
# base_delay_ms = 500
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_found = cli.config.is_some() || Path::new(CONFIG_FILE).exists();
    let config = load_config(cli.config.as_deref())?;

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    tracing::debug!(format = %cli.format, report_id = %config.report.id, "configuration loaded");

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Run {
            report,
            fail_on_errors,
            no_fail_on_errors,
            fail_if_no_pr,
            no_fail_if_no_pr,
            remove_previous_comments,
            no_remove_previous_comments,
        }) => {
            let env = Environment::from_process();
            let overrides = CommitOverrides {
                base: report.base,
                head: report.head,
            };
            let resolution = tripwire_ci::resolve(&CiProvider::PRIORITY, &env, &overrides)?;
            let findings = if resolution.is_pull_request() {
                read_findings(report.findings.as_deref())?
            } else {
                FindingsSet::default()
            };

            let options = RunOptions {
                report_id: report_id(report.report_id.as_deref(), &config)?,
                fail_on_errors: layered(
                    fail_on_errors,
                    no_fail_on_errors,
                    config.report.fail_on_errors,
                ),
                fail_if_no_pr: layered(fail_if_no_pr, no_fail_if_no_pr, config.report.fail_if_no_pr),
                remove_previous_comments: layered(
                    remove_previous_comments,
                    no_remove_previous_comments,
                    config.report.remove_previous_comments,
                ),
            };
            let retry = RetryPolicy::from(&config.retry);

            let spinner = if resolution.is_pull_request() && std::io::stderr().is_terminal() {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .into_diagnostic()?,
                );
                pb.set_message("Syncing report comment...");
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let outcome = execute(resolution, &findings, &options, &retry, |provider, _| {
                tripwire_review::connect::connect(&config.host, provider, &env)
            })
            .await
            .inspect_err(|_e| {
                if let Some(pb) = &spinner {
                    pb.finish_with_message("Failed");
                }
            })?;

            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }

            print_outcome(&outcome, &findings, cli.format, use_color)?;

            let code = outcome.decision.exit_code();
            if code != 0 {
                std::process::exit(code);
            }
        }
        Some(Command::Preview { report }) => {
            let findings = read_findings(report.findings.as_deref())?;
            let id = report_id(report.report_id.as_deref(), &config)?;
            let rendered = render(
                &findings,
                report.base.as_deref().unwrap_or_default(),
                report.head.as_deref().unwrap_or_default(),
                &id,
            );
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&rendered).into_diagnostic()?);
                }
                OutputFormat::Text => {
                    print!("{}", rendered.body);
                    println!();
                    print_status(&findings, &rendered.status_line, use_color);
                }
            }
        }
        Some(Command::Init) => {
            let path = Path::new(CONFIG_FILE);
            if path.exists() {
                miette::bail!("{CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {CONFIG_FILE} with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(&config, config_found, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tripwire", &mut std::io::stdout());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    fn status_of<'a>(checks: &'a [CheckResult], name: &str) -> &'a str {
        checks
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.status)
            .unwrap_or("missing")
    }

    #[test]
    fn default_config_parses() {
        let config = TripwireConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.report.id, "tripwire");
        assert_eq!(config.host.kind, HostKind::Auto);
    }

    #[test]
    fn command_line_flags_override_config_both_ways() {
        assert!(layered(true, false, false));
        assert!(!layered(false, true, true));
        assert!(layered(false, false, true));
        assert!(!layered(false, false, false));
    }

    #[test]
    fn later_flag_of_a_pair_wins() {
        let cli = Cli::try_parse_from([
            "tripwire",
            "run",
            "--fail-if-no-pr",
            "--no-fail-if-no-pr",
        ])
        .unwrap();
        let Some(Command::Run {
            fail_if_no_pr,
            no_fail_if_no_pr,
            ..
        }) = cli.command
        else {
            panic!("expected run");
        };
        assert!(!fail_if_no_pr);
        assert!(no_fail_if_no_pr);
    }

    #[test]
    fn doctor_stops_without_ci() {
        let checks = doctor_checks(&TripwireConfig::default(), false, &env(&[]));
        assert_eq!(status_of(&checks, "ci_provider"), "fail");
        assert_eq!(status_of(&checks, "pull_request"), "missing");
    }

    #[test]
    fn doctor_reports_gitlab_merge_request() {
        let checks = doctor_checks(
            &TripwireConfig::default(),
            false,
            &env(&[
                ("GITLAB_CI", "true"),
                ("CI_MERGE_REQUEST_IID", "42"),
                ("CI_PROJECT_PATH", "group/project"),
                ("GITLAB_TOKEN", "glpat"),
            ]),
        );
        assert_eq!(status_of(&checks, "ci_provider"), "pass");
        assert_eq!(status_of(&checks, "pull_request"), "pass");
        assert_eq!(status_of(&checks, "host_token"), "pass");
        let host = checks.iter().find(|c| c.name == "review_host").unwrap();
        assert_eq!(host.detail, "gitlab");
    }

    #[test]
    fn doctor_flags_missing_github_token() {
        let checks = doctor_checks(
            &TripwireConfig::default(),
            true,
            &env(&[("GITHUB_ACTIONS", "true"), ("GITHUB_EVENT_NAME", "push")]),
        );
        assert_eq!(status_of(&checks, "pull_request"), "info");
        assert_eq!(status_of(&checks, "host_token"), "fail");
    }
}
