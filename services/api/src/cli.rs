use crate::demo::{reference_instant, render_score, run_demo, DemoArgs, OfflineRegistry};
use crate::infra::InMemoryComplianceRepository;
use crate::server;
use bio_conformity::ai::ConfiguredAiClient;
use bio_conformity::certificates::{days_until, evaluate_at};
use bio_conformity::config::AppConfig;
use bio_conformity::error::AppError;
use bio_conformity::scoring::{compute_at, ScoreSnapshot};
use bio_conformity::service::{ComplianceService, ComplianceServiceError, ServiceConfig};
use bio_conformity::telemetry;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Organic Conformity",
    about = "Classify invoice inputs, track certificates and score organic farm compliance",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Extract and classify an invoice document through the configured AI provider
    Scan(ScanArgs),
    /// Compute a security score from a JSON counts snapshot
    Score(ScoreArgs),
    /// Evaluate a certificate expiration date
    Certificate(CertificateArgs),
    /// Run an offline end-to-end demo on seeded records
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ScanArgs {
    /// Invoice image or PDF
    pub(crate) document: PathBuf,
    /// MIME type of the document; guessed from the extension when omitted
    #[arg(long)]
    pub(crate) mime_type: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON file holding the record counts
    pub(crate) snapshot: PathBuf,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct CertificateArgs {
    /// Expiration date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) expires_on: NaiveDate,
    /// Evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Scan(args) => run_scan(args).await,
        Command::Score(args) => run_score(args),
        Command::Certificate(args) => {
            run_certificate(args);
            Ok(())
        }
        Command::Demo(args) => run_demo(args).await,
    }
}

pub(crate) fn guess_mime_type(path: &Path, explicit: Option<String>) -> Option<String> {
    explicit
        .filter(|mime| !mime.trim().is_empty())
        .or_else(|| mime_guess::from_path(path).first_raw().map(str::to_string))
}

async fn run_scan(args: ScanArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let mime_type = guess_mime_type(&args.document, args.mime_type).ok_or_else(|| {
        ComplianceServiceError::InvalidDocument(format!(
            "cannot guess the type of {}; pass --mime-type",
            args.document.display()
        ))
    })?;
    let document = std::fs::read(&args.document)?;

    let service = ComplianceService::new(
        Arc::new(InMemoryComplianceRepository::default()),
        Arc::new(ConfiguredAiClient::from_config(&config.ai)?),
        Arc::new(OfflineRegistry),
        ServiceConfig::from_app_config(&config),
    );
    let scanned = service.scan(None, &document, &mime_type).await?;
    println!("{}", serde_json::to_string_pretty(&scanned)?);
    Ok(())
}

fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.snapshot)?;
    let snapshot: ScoreSnapshot = serde_json::from_str(&raw)?;
    let score = compute_at(&snapshot, reference_instant(args.today));
    render_score(&score);
    Ok(())
}

fn run_certificate(args: CertificateArgs) {
    let now = reference_instant(args.today);
    let status = evaluate_at(args.expires_on, now);
    println!(
        "Certificate expiring {}: {} ({} day(s) remaining)",
        args.expires_on,
        status.label(),
        days_until(args.expires_on, now)
    );
}
