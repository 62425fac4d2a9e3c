use std::{path::PathBuf, process::ExitCode, sync::Arc, time::Duration};

use chrono::Utc;
use clap::Parser;
use model_audit::{
    catalog::{CatalogError, CatalogExtraction, load_catalog},
    client::{
        AllowList, AutoDecline, ClientError, InteractivePrompt, LicensePrompt, ResilientClient,
    },
    config::{API_KEY_ENV, AuditConfig, LicenseConfig, LicensePolicy},
    docs::{DocsCoverage, PublishedCoverage, fetch_published, read_local_doc},
    observability::init_tracing,
    report::{self, AuditReport, ReportError, Summary},
    runner::{Runner, TestResult},
    synth::AudioSource,
};

/// CLI arguments for the model audit
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Audit the model catalog against its documentation and the live endpoint",
    long_about = None
)]
struct Args {
    /// Only reconcile documentation; run no live tests
    #[arg(long, conflicts_with_all = ["test_only", "modules"])]
    docs_only: bool,

    /// Skip the published documentation check
    #[arg(long)]
    skip_published: bool,

    /// Only run live tests; skip documentation checks
    #[arg(long)]
    test_only: bool,

    /// Run the platform module smoke tests instead of per-capability tests
    #[arg(long)]
    modules: bool,

    /// Test a single model by catalog name
    #[arg(long, value_name = "NAME")]
    model: Option<String>,

    /// Log request and response bodies (large binary fields are elided)
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file (defaults to model-audit.toml if it exists)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model registry file, overriding `catalog.path`
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Local reference document, overriding `docs.local_path`
    #[arg(long, value_name = "PATH")]
    local_docs: Option<PathBuf>,

    /// How license gates are answered
    #[arg(long, value_enum)]
    license_policy: Option<LicensePolicyArg>,

    /// Pre-approve a model's license (repeatable); implies `--license-policy allow`
    #[arg(long = "accept-license", value_name = "NAME")]
    accept_license: Vec<String>,

    /// Write a JSON report to this path
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Exit non-zero when any test fails
    #[arg(long)]
    strict: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LicensePolicyArg {
    Prompt,
    Decline,
    Allow,
}

impl From<LicensePolicyArg> for LicensePolicy {
    fn from(value: LicensePolicyArg) -> Self {
        match value {
            LicensePolicyArg::Prompt => LicensePolicy::Prompt,
            LicensePolicyArg::Decline => LicensePolicy::Decline,
            LicensePolicyArg::Allow => LicensePolicy::Allow,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum AuditError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut config = match AuditConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return ExitCode::FAILURE;
        }
    };
    apply_cli_overrides(&mut config, &args);

    if let Err(e) = init_tracing(&config.observability.logging, args.verbose) {
        eprintln!("Warning: {e}");
    }

    match run(&args, &config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Audit aborted");
            ExitCode::FAILURE
        }
    }
}

/// CLI flags take precedence over the file and environment.
fn apply_cli_overrides(config: &mut AuditConfig, args: &Args) {
    if let Some(path) = &args.catalog {
        config.catalog.path = path.clone();
    }
    if let Some(path) = &args.local_docs {
        config.docs.local_path = path.clone();
    }
    if !args.accept_license.is_empty() {
        config.license.allow.extend(args.accept_license.iter().cloned());
        config.license.policy = LicensePolicy::Allow;
    }
    if let Some(policy) = args.license_policy {
        config.license.policy = policy.into();
    }
    if args.strict {
        config.audit.strict = true;
    }
}

async fn run(args: &Args, config: &AuditConfig) -> Result<ExitCode, AuditError> {
    let catalog = load_catalog(&config.catalog.path, &config.catalog.marker)?;
    report::print_phase_header("Catalog");
    report::print_catalog_summary(&catalog);

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.endpoint.timeout_secs))
        .build()
        .map_err(ClientError::Build)?;

    let mut docs_coverage = None;
    let mut published_coverage = None;
    if !args.test_only {
        docs_coverage = check_local_docs(config, &catalog);
        if !args.skip_published {
            published_coverage = Some(check_published_docs(&http, config, &catalog).await);
        }
    }

    let mut results = Vec::new();
    if !args.docs_only {
        if config.has_api_key() {
            results = run_live_tests(args, config, &catalog, http).await?;
        } else {
            tracing::warn!(
                env = API_KEY_ENV,
                "No API key configured, skipping live tests"
            );
        }
    }

    let summary = Summary::tally(&results);
    if !args.docs_only && !results.is_empty() {
        report::print_summary(&summary);
    }

    if let Some(path) = &args.report {
        AuditReport {
            generated_at: Utc::now(),
            base_url: &config.endpoint.base_url,
            models: catalog.len(),
            skipped_entries: &catalog.skipped,
            docs: docs_coverage.as_ref(),
            published: published_coverage.as_ref(),
            results: &results,
            summary: &summary,
        }
        .write_to(path)?;
    }

    if config.audit.strict && summary.has_failures() {
        tracing::info!(failed = summary.failed, "Failing run in strict mode");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn check_local_docs(config: &AuditConfig, catalog: &CatalogExtraction) -> Option<DocsCoverage> {
    report::print_phase_header("Local documentation");
    match read_local_doc(&config.docs.local_path) {
        Ok(names) => {
            let coverage = DocsCoverage::compute(catalog.names(), names.iter().map(String::as_str));
            report::print_docs_coverage(&coverage);
            Some(coverage)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Skipping local documentation check");
            None
        }
    }
}

async fn check_published_docs(
    http: &reqwest::Client,
    config: &AuditConfig,
    catalog: &CatalogExtraction,
) -> PublishedCoverage {
    report::print_phase_header("Published documentation");
    let coverage = fetch_published(http, &config.docs.published_url, catalog.names()).await;
    report::print_published_coverage(&coverage);
    coverage
}

async fn run_live_tests(
    args: &Args,
    config: &AuditConfig,
    catalog: &CatalogExtraction,
    http: reqwest::Client,
) -> Result<Vec<TestResult>, AuditError> {
    if let Some(model) = &args.model
        && catalog.get(model).is_none()
    {
        tracing::warn!(model = %model, "Requested model is not in the catalog");
    }

    let client = ResilientClient::new(
        &config.endpoint,
        config.retry.clone(),
        license_prompt(&config.license),
    )?;
    let audio = AudioSource::new(http, config.inputs.audio_clip_url.clone());
    let runner = Runner::new(&client, &audio);
    let filter = args.model.as_deref();

    let results = if args.modules {
        report::print_phase_header("Platform modules");
        runner.run_platform_tests(catalog, filter).await
    } else {
        report::print_phase_header("Model capabilities");
        runner.run_catalog_tests(catalog, filter).await
    };
    Ok(results)
}

fn license_prompt(config: &LicenseConfig) -> Arc<dyn LicensePrompt> {
    match config.policy {
        LicensePolicy::Prompt => Arc::new(InteractivePrompt),
        LicensePolicy::Decline => Arc::new(AutoDecline),
        LicensePolicy::Allow => Arc::new(AllowList::new(config.allow.iter().cloned())),
    }
}
