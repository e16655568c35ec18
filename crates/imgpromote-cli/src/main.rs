//! imgpromote - container image tag promotion CLI
//!
//! ## Commands
//!
//! - `promote`: pull, retag and push one or more images, write the run log
//!   and results file
//! - `notify`: mail an HTML report built from a results file
//! - `run`: `promote` followed by `notify`
//!
//! ## Exit codes
//!
//! 0 success, 2 a registry step failed, 3 a request failed validation,
//! 4 a results or log file could not be written or read, 5 the notification
//! could not be delivered.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use imgpromote_core::{
    init_tracing, read_results_json, write_results_json, ContainerCli, JobReport, JobStatus,
    Orchestrator, PromotionResult, PromotionStep, PromotionStrategy, Promoter, ResultsArtifact,
    RetryPolicy, RunLog, DEFAULT_CONCURRENCY,
};
use imgpromote_notify::{
    parse_recipients, CorrelationMetadata, Mailer, NotificationPayload, Notifier, SmtpConfig,
    SmtpMailer, Templates,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};

const EXIT_STEP_FAILED: u8 = 2;
const EXIT_VALIDATION_FAILED: u8 = 3;
const EXIT_ARTIFACT: u8 = 4;
const EXIT_NOTIFY_FAILED: u8 = 5;

#[derive(Parser)]
#[command(name = "imgpromote")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Promote container images between registry tags", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Promote images and write the results file
    Promote {
        #[command(flatten)]
        promote: PromoteArgs,
    },

    /// Mail a report for a finished promotion job
    Notify {
        #[command(flatten)]
        delivery: DeliveryArgs,

        /// Overall status (derived from the results file when omitted)
        #[arg(long)]
        status: Option<JobStatus>,

        /// Log file to attach (repeatable)
        #[arg(long = "log-file")]
        log_files: Vec<PathBuf>,

        /// Results file written by `promote`
        #[arg(long)]
        results_file: Option<PathBuf>,
    },

    /// Promote images, then mail the report
    Run {
        #[command(flatten)]
        promote: PromoteArgs,

        #[command(flatten)]
        delivery: DeliveryArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct PromoteArgs {
    /// Registry endpoint, e.g. registry.example.com/team
    #[arg(long, env = "IMGPROMOTE_REGISTRY")]
    registry: String,

    /// Image to promote; repeat or separate with commas
    #[arg(long = "image", env = "IMGPROMOTE_IMAGES", value_delimiter = ',', required = true)]
    images: Vec<String>,

    /// latest-promote (latest -> stable) or custom-tags
    #[arg(
        long,
        visible_alias = "mode",
        env = "IMGPROMOTE_STRATEGY",
        default_value = "latest-promote"
    )]
    strategy: PromotionStrategy,

    /// Source tag for custom-tags
    #[arg(long, aliases = ["custom1", "tag1"], env = "IMGPROMOTE_SOURCE_TAG")]
    source_tag: Option<String>,

    /// Destination tag for custom-tags
    #[arg(long, aliases = ["custom2", "tag2"], env = "IMGPROMOTE_DEST_TAG")]
    dest_tag: Option<String>,

    /// YES to pull and retag without pushing
    #[arg(
        long,
        env = "IMGPROMOTE_DRY_RUN",
        default_value = "NO",
        value_parser = parse_yes_no,
        action = ArgAction::Set
    )]
    dry_run: bool,

    /// Run log, attached to notifications
    #[arg(
        long,
        aliases = ["log", "logfile"],
        env = "IMGPROMOTE_LOG_FILE",
        default_value = "promote.log"
    )]
    log_file: PathBuf,

    /// Results file read by `notify`
    #[arg(long, env = "IMGPROMOTE_RESULTS_FILE", default_value = "promotion_results.json")]
    results_file: PathBuf,

    /// Promotions allowed to run at once
    #[arg(long, env = "IMGPROMOTE_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Attempts per step
    #[arg(long, env = "IMGPROMOTE_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Seconds between attempts
    #[arg(long, env = "IMGPROMOTE_RETRY_DELAY_SECS", default_value_t = 5)]
    retry_delay_secs: u64,

    /// Per-attempt timeout in seconds (0 disables)
    #[arg(long, env = "IMGPROMOTE_STEP_TIMEOUT_SECS", default_value_t = 300)]
    step_timeout_secs: u64,

    /// Container CLI binary (docker, podman)
    #[arg(long, env = "IMGPROMOTE_CONTAINER_CLI", default_value = "docker")]
    container_cli: String,
}

#[derive(Args, Debug, Clone)]
struct DeliveryArgs {
    /// Comma-separated recipient addresses
    #[arg(long, env = "IMGPROMOTE_RECIPIENTS")]
    recipients: String,

    /// CI job URL
    #[arg(long, alias = "jenkins-url", env = "IMGPROMOTE_JOB_URL", default_value = "")]
    job_url: String,

    /// Release notes or ticket URL; its last segment is the ticket number
    #[arg(long, env = "IMGPROMOTE_RELEASE_LINK", default_value = "")]
    release_link: String,

    /// Job name and build number
    #[arg(long, env = "IMGPROMOTE_BUILD_INFO", default_value = "")]
    build_info: String,

    /// Dry-run text shown in the report
    #[arg(long)]
    dry_run_status: Option<String>,

    /// JSON object of job parameters
    #[arg(long, env = "IMGPROMOTE_PARAMETERS_JSON", default_value = "{}")]
    parameters_json: String,

    /// Directory holding email_success.html / email_failure.html
    #[arg(long, env = "IMGPROMOTE_TEMPLATE_DIR")]
    template_dir: Option<PathBuf>,

    /// Logo image attached inline
    #[arg(long, env = "IMGPROMOTE_LOGO")]
    logo: Option<PathBuf>,
}

impl DeliveryArgs {
    fn metadata(&self, dry_run_fallback: &str) -> CorrelationMetadata {
        CorrelationMetadata {
            release_link: self.release_link.clone(),
            job_url: self.job_url.clone(),
            build_info: self.build_info.clone(),
            dry_run_status: self
                .dry_run_status
                .clone()
                .unwrap_or_else(|| dry_run_fallback.to_string()),
            parameters_json: self.parameters_json.clone(),
        }
    }

    fn notifier(&self, mailer: Arc<dyn Mailer>, config: &SmtpConfig) -> Notifier {
        let templates = match &self.template_dir {
            Some(dir) => Templates::from_dir(dir),
            None => Templates::Builtin,
        };
        let mut notifier = Notifier::new(mailer, config.from.clone())
            .with_templates(templates)
            .with_logo_url(config.logo_url.clone().unwrap_or_default());
        if let Some(logo) = &self.logo {
            notifier = notifier.with_logo_file(logo);
        }
        notifier
    }
}

fn parse_yes_no(raw: &str) -> std::result::Result<bool, String> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "YES" | "Y" | "TRUE" | "1" => Ok(true),
        "NO" | "N" | "FALSE" | "0" => Ok(false),
        other => Err(format!("expected YES or NO, got '{}'", other)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let outcome = match cli.command {
        Commands::Promote { promote } => cmd_promote(&promote).await,
        Commands::Notify {
            delivery,
            status,
            log_files,
            results_file,
        } => cmd_notify(&delivery, status, log_files, results_file.as_deref()).await,
        Commands::Run { promote, delivery } => cmd_run(&promote, &delivery).await,
    };

    match outcome {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!(error = %format!("{:#}", e), "artifact error");
            eprintln!("Error: {:#}", e);
            ExitCode::from(EXIT_ARTIFACT)
        }
    }
}

/// Exit code for a set of results: registry step failures win over
/// validation failures.
fn promotion_exit_code(results: &[PromotionResult]) -> u8 {
    let failures = || results.iter().filter(|r| r.is_failure());
    if failures().any(|r| r.failed_step != Some(PromotionStep::Validate)) {
        EXIT_STEP_FAILED
    } else if failures().next().is_some() {
        EXIT_VALIDATION_FAILED
    } else {
        0
    }
}

/// A finished promotion job and whether its results file was written.
struct PromotionRun {
    report: JobReport,
    artifact_error: Option<anyhow::Error>,
}

async fn run_promotion(args: &PromoteArgs) -> Result<PromotionRun> {
    let log = RunLog::open(&args.log_file)
        .with_context(|| format!("open run log {:?}", args.log_file))?;

    let policy = RetryPolicy::new(args.max_attempts, Duration::from_secs(args.retry_delay_secs))
        .with_step_timeout(Duration::from_secs(args.step_timeout_secs));
    let client = Arc::new(ContainerCli::new(args.container_cli.as_str()));
    let promoter = Arc::new(Promoter::new(client, policy, log.clone()));
    let orchestrator = Orchestrator::new(promoter, args.concurrency);

    let requests = args.strategy.requests(
        &args.images,
        args.source_tag.as_deref(),
        args.dest_tag.as_deref(),
        &args.registry,
        args.dry_run,
    );
    log.info(format!(
        "Strategy {} on {} for {} image(s), dry_run={}",
        args.strategy,
        args.registry,
        requests.len(),
        args.dry_run
    ));
    info!(strategy = %args.strategy, registry = %args.registry, images = requests.len(), "starting promotion");

    let report = orchestrator.run(requests).await;
    print_summary(&report);

    let artifact = ResultsArtifact::from_report(&report, args.dry_run);
    let artifact_error = match write_results_json(&args.results_file, &artifact) {
        Ok(()) => {
            info!(path = %args.results_file.display(), "results written");
            None
        }
        Err(e) => {
            log.error(format!("Could not write results file: {:#}", e));
            error!(error = %format!("{:#}", e), "results file not written");
            eprintln!("Error: {:#}", e);
            Some(e)
        }
    };

    Ok(PromotionRun {
        report,
        artifact_error,
    })
}

fn print_summary(report: &JobReport) {
    println!(
        "Job {}: {} ({} passed, {} failed, {}ms)",
        report.job_id,
        report.status,
        report.passed_count(),
        report.failed_count(),
        report.duration_ms
    );
    for result in &report.results {
        println!(
            "  {:<24} {} -> {}  {:<16} {}",
            result.image, result.source_tag, result.destination_tag, result.status, result.message
        );
    }
}

/// Promotion outcome first; reporting problems only when every image went
/// through.
fn combine_exit_codes(promotion: u8, reporting: u8) -> u8 {
    if promotion != 0 {
        promotion
    } else {
        reporting
    }
}

async fn cmd_promote(args: &PromoteArgs) -> Result<u8> {
    let run = run_promotion(args).await?;
    let reporting = if run.artifact_error.is_some() {
        EXIT_ARTIFACT
    } else {
        0
    };
    Ok(combine_exit_codes(
        promotion_exit_code(&run.report.results),
        reporting,
    ))
}

async fn cmd_notify(
    delivery: &DeliveryArgs,
    status: Option<JobStatus>,
    log_files: Vec<PathBuf>,
    results_file: Option<&Path>,
) -> Result<u8> {
    let (results, results_readable) = load_results(results_file);
    let status = resolve_status(results_readable, status, &results);

    let mut payload = NotificationPayload::from_results(
        results,
        parse_recipients(&delivery.recipients),
        delivery.metadata("NO"),
    )
    .with_status(status);
    payload.log_files = log_files;

    let code = deliver(delivery, &payload).await;
    Ok(notify_exit_code(code, results_readable))
}

/// Results for `notify`, and whether they could be read. No file means an
/// empty, readable result set.
fn load_results(path: Option<&Path>) -> (Vec<PromotionResult>, bool) {
    let Some(path) = path else {
        return (Vec::new(), true);
    };
    match read_results_json(path) {
        Ok(results) => (results, true),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "results unavailable, reporting failure");
            eprintln!("Error: {:#}", e);
            (Vec::new(), false)
        }
    }
}

/// Unreadable results always report FAILURE; otherwise `--status` wins over
/// the status derived from the results.
fn resolve_status(
    results_readable: bool,
    requested: Option<JobStatus>,
    results: &[PromotionResult],
) -> JobStatus {
    match (results_readable, requested) {
        (false, _) => JobStatus::Failure,
        (true, Some(status)) => status,
        (true, None) => JobStatus::from_results(results),
    }
}

/// A delivery failure wins; an unreadable results file is reported as an
/// artifact error once the mail went out.
fn notify_exit_code(delivery: u8, results_readable: bool) -> u8 {
    if results_readable {
        delivery
    } else {
        combine_exit_codes(delivery, EXIT_ARTIFACT)
    }
}

async fn cmd_run(promote: &PromoteArgs, delivery: &DeliveryArgs) -> Result<u8> {
    let run = run_promotion(promote).await?;

    let dry_run_text = if promote.dry_run { "YES" } else { "NO" };
    let payload = NotificationPayload::from_results(
        run.report.results.clone(),
        parse_recipients(&delivery.recipients),
        delivery.metadata(dry_run_text),
    )
    .with_status(run.report.status)
    .with_log_file(&promote.log_file);

    let notify_code = deliver(delivery, &payload).await;
    let reporting = if run.artifact_error.is_some() {
        EXIT_ARTIFACT
    } else {
        notify_code
    };
    Ok(combine_exit_codes(
        promotion_exit_code(&run.report.results),
        reporting,
    ))
}

/// Send the report over SMTP. Returns 0 or the notification exit code.
async fn deliver(delivery: &DeliveryArgs, payload: &NotificationPayload) -> u8 {
    let config = match SmtpConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "mail transport not configured");
            eprintln!("Error: {}", e);
            return EXIT_NOTIFY_FAILED;
        }
    };

    let mailer = Arc::new(SmtpMailer::new(config.clone()));
    send_report(delivery.notifier(mailer, &config), payload).await
}

async fn send_report(notifier: Notifier, payload: &NotificationPayload) -> u8 {
    match notifier.notify(payload).await {
        Ok(receipt) => {
            println!(
                "Notification sent to {}: {}",
                receipt.recipients.join(", "),
                receipt.subject
            );
            for skipped in &receipt.skipped {
                println!("  (log not attached: {})", skipped.display());
            }
            0
        }
        Err(e) => {
            error!(error = %e, "notification failed");
            eprintln!("Error: notification failed: {}", e);
            EXIT_NOTIFY_FAILED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgpromote_core::PromotionRequest;
    use imgpromote_notify::fakes::MemoryMailer;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("parse")
    }

    fn promote_args(cli: Cli) -> PromoteArgs {
        match cli.command {
            Commands::Promote { promote } => promote,
            _ => panic!("expected promote"),
        }
    }

    #[test]
    fn test_promote_defaults() {
        let args = promote_args(parse(&[
            "imgpromote",
            "promote",
            "--registry",
            "reg.example.com",
            "--image",
            "api,web",
        ]));
        assert_eq!(args.images, vec!["api", "web"]);
        assert_eq!(args.strategy, PromotionStrategy::LatestPromote);
        assert!(!args.dry_run);
        assert_eq!(args.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(args.max_attempts, 3);
        assert_eq!(args.retry_delay_secs, 5);
        assert_eq!(args.step_timeout_secs, 300);
        assert_eq!(args.container_cli, "docker");
    }

    #[test]
    fn test_legacy_flag_aliases() {
        let args = promote_args(parse(&[
            "imgpromote",
            "promote",
            "--registry",
            "reg",
            "--image",
            "api",
            "--image",
            "web",
            "--mode",
            "CUSTOM_TAGS",
            "--custom1",
            "1.2.0",
            "--tag2",
            "prod",
            "--dry-run",
            "YES",
            "--logfile",
            "/var/log/promote.log",
        ]));
        assert_eq!(args.images, vec!["api", "web"]);
        assert_eq!(args.strategy, PromotionStrategy::CustomTags);
        assert_eq!(args.source_tag.as_deref(), Some("1.2.0"));
        assert_eq!(args.dest_tag.as_deref(), Some("prod"));
        assert!(args.dry_run);
        assert_eq!(args.log_file, PathBuf::from("/var/log/promote.log"));

        let args = promote_args(parse(&[
            "imgpromote",
            "promote",
            "--registry",
            "reg",
            "--image",
            "api",
            "--log",
            "run.log",
        ]));
        assert_eq!(args.log_file, PathBuf::from("run.log"));
    }

    #[test]
    fn test_bad_dry_run_value_rejected() {
        let result = Cli::try_parse_from([
            "imgpromote",
            "promote",
            "--registry",
            "reg",
            "--image",
            "api",
            "--dry-run",
            "maybe",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_notify_status_is_optional() {
        let cli = parse(&[
            "imgpromote",
            "notify",
            "--recipients",
            "a@x.com",
            "--log-file",
            "one.log",
            "--log-file",
            "two.log",
            "--jenkins-url",
            "https://ci/job/1",
        ]);
        match cli.command {
            Commands::Notify {
                status,
                log_files,
                delivery,
                ..
            } => {
                assert!(status.is_none());
                assert_eq!(log_files.len(), 2);
                assert_eq!(delivery.job_url, "https://ci/job/1");
            }
            _ => panic!("expected notify"),
        }
    }

    #[test]
    fn test_exit_code_precedence() {
        let ok = PromotionRequest::new("a", "latest", "stable", "reg", false);
        let success = PromotionResult::success(&ok, "ok", 0);
        let invalid = PromotionResult::failure(&ok, Some(PromotionStep::Validate), "bad", 0);
        let pushed = PromotionResult::failure(&ok, Some(PromotionStep::Push), "denied", 0);

        assert_eq!(promotion_exit_code(&[success.clone()]), 0);
        assert_eq!(promotion_exit_code(&[]), 0);
        assert_eq!(
            promotion_exit_code(&[success.clone(), invalid.clone()]),
            EXIT_VALIDATION_FAILED
        );
        assert_eq!(promotion_exit_code(&[invalid, pushed]), EXIT_STEP_FAILED);

        assert_eq!(combine_exit_codes(0, EXIT_NOTIFY_FAILED), EXIT_NOTIFY_FAILED);
        assert_eq!(combine_exit_codes(EXIT_STEP_FAILED, EXIT_ARTIFACT), EXIT_STEP_FAILED);
    }

    #[test]
    fn test_notify_status_derived_from_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.json");
        let req = PromotionRequest::new("api", "latest", "stable", "reg", false);
        let results = vec![
            PromotionResult::success(&req, "ok", 0),
            PromotionResult::failure(&req, Some(PromotionStep::Push), "denied", 0),
        ];
        let report = JobReport {
            job_id: "job-1".to_string(),
            status: JobStatus::from_results(&results),
            results,
            duration_ms: 0,
        };
        write_results_json(&path, &ResultsArtifact::from_report(&report, false))
            .expect("write results");

        let (loaded, readable) = load_results(Some(&path));
        assert!(readable);
        assert_eq!(loaded.len(), 2);
        assert_eq!(resolve_status(readable, None, &loaded), JobStatus::Failure);
        assert_eq!(
            resolve_status(readable, Some(JobStatus::Success), &loaded),
            JobStatus::Success
        );
        assert_eq!(notify_exit_code(0, readable), 0);
    }

    #[test]
    fn test_notify_without_results_file_is_success() {
        let (loaded, readable) = load_results(None);
        assert!(readable);
        assert!(loaded.is_empty());
        assert_eq!(resolve_status(readable, None, &loaded), JobStatus::Success);
    }

    #[test]
    fn test_notify_unreadable_results_forces_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{bad").expect("write");

        for path in [path, dir.path().join("missing.json")] {
            let (loaded, readable) = load_results(Some(&path));
            assert!(!readable);
            assert!(loaded.is_empty());
            assert_eq!(
                resolve_status(readable, Some(JobStatus::Success), &loaded),
                JobStatus::Failure
            );
        }

        assert_eq!(notify_exit_code(0, false), EXIT_ARTIFACT);
        assert_eq!(notify_exit_code(EXIT_NOTIFY_FAILED, false), EXIT_NOTIFY_FAILED);
        assert_eq!(notify_exit_code(EXIT_NOTIFY_FAILED, true), EXIT_NOTIFY_FAILED);
    }

    #[tokio::test]
    async fn test_promote_with_missing_cli_writes_failed_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let results_file = dir.path().join("results.json");
        let log_file = dir.path().join("logs").join("promote.log");
        let mut args = promote_args(parse(&[
            "imgpromote",
            "promote",
            "--registry",
            "reg",
            "--image",
            "api",
            "--container-cli",
            "imgpromote-no-such-binary",
        ]));
        args.results_file = results_file.clone();
        args.log_file = log_file.clone();

        let code = cmd_promote(&args).await.expect("promote");
        assert_eq!(code, EXIT_STEP_FAILED);

        let results = read_results_json(&results_file).expect("results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].failed_step, Some(PromotionStep::Pull));
        let log = std::fs::read_to_string(&log_file).expect("log");
        assert!(log.contains("ERROR"));
    }

    #[tokio::test]
    async fn test_send_report_maps_delivery_failure() {
        let cli = parse(&["imgpromote", "notify", "--recipients", "a@x.com"]);
        let delivery = match cli.command {
            Commands::Notify { delivery, .. } => delivery,
            _ => panic!("expected notify"),
        };
        let config = SmtpConfig::from_lookup(|key| {
            (key == "IMGPROMOTE_SMTP_HOST").then(|| "localhost".to_string())
        })
        .expect("config");
        let payload = NotificationPayload::from_results(
            Vec::new(),
            parse_recipients(&delivery.recipients),
            delivery.metadata("NO"),
        );

        let ok = Arc::new(MemoryMailer::new());
        assert_eq!(send_report(delivery.notifier(ok.clone(), &config), &payload).await, 0);
        assert_eq!(ok.sent_count(), 1);
        assert_eq!(ok.sent()[0].subject, "[SUCCESS] Docker Tagging Job: ");

        let failing = Arc::new(MemoryMailer::failing("refused"));
        assert_eq!(
            send_report(delivery.notifier(failing, &config), &payload).await,
            EXIT_NOTIFY_FAILED
        );
    }
}
