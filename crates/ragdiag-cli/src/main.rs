//! ragdiag - staged failure diagnosis for RAG API deployments
//!
//! Localises a failing request along the chain
//! client -> adapter server -> backend API -> downstream model provider
//! by checking liveness before authentication.
//!
//! ## Commands
//!
//! - `diagnose`: liveness stage, then authenticated query probe
//! - `health`: liveness stage only (`/auth-status`, then `/health`)
//!
//! Target settings come from `LIGHTRAG_API_URL`, `LIGHTRAG_API_KEY`,
//! `RAGDIAG_TIMEOUT_MS` and `RAGDIAG_RETRIES`; command-line flags override
//! them.

mod report;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use ragdiag_core::{CancellationToken, DiagnosticEngine, DynProbe, EngineConfig};
use ragdiag_http::config::{DEFAULT_QUERY, DEFAULT_QUERY_MODE};
use ragdiag_http::{default_probes, liveness_probes, HttpTarget, TargetConfig};
use tokio::time::Instant;
use tracing::{info, Level};

use report::{exit_code, DiagnosisReport};

#[derive(Parser)]
#[command(name = "ragdiag")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Staged failure diagnosis for RAG API deployments", long_about = None)]
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

#[derive(Args, Debug, Clone)]
struct TargetArgs {
    /// Base URL of the RAG API server [env: LIGHTRAG_API_URL]
    #[arg(long)]
    url: Option<String>,

    /// API key presented by the calling layer (X-API-Key) [env: LIGHTRAG_API_KEY]
    #[arg(long)]
    api_key: Option<String>,

    /// Per-probe bound in milliseconds [env: RAGDIAG_TIMEOUT_MS]
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Retries for the liveness probe before declaring it failed [env: RAGDIAG_RETRIES]
    #[arg(long)]
    retries: Option<u32>,

    /// Do not send the API key with the `/health` probe
    #[arg(long)]
    health_no_auth: bool,

    /// Skip the `/auth-status` check (servers without that route)
    #[arg(long)]
    skip_auth_status: bool,
}

impl TargetArgs {
    fn to_config(&self) -> Result<TargetConfig> {
        let base = TargetConfig::from_env().context("Invalid target environment")?;
        self.apply(base)
    }

    /// Overlay explicit flags on `base` and validate the result.
    fn apply(&self, base: TargetConfig) -> Result<TargetConfig> {
        let mut config = base;
        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config = config.with_timeout_ms(timeout_ms);
        }
        if let Some(retries) = self.retries {
            config = config.with_retries(retries);
        }
        if self.health_no_auth {
            config = config.with_health_credential(false);
        }
        if self.skip_auth_status {
            config = config.with_auth_status_check(false);
        }

        config.validate().context("Invalid target configuration")?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full probe sequence: liveness, then authenticated query
    Diagnose {
        #[command(flatten)]
        target: TargetArgs,

        /// Query text sent by the authenticated probe
        #[arg(long, default_value = DEFAULT_QUERY)]
        query: String,

        /// Retrieval mode for the authenticated probe
        #[arg(long, default_value = DEFAULT_QUERY_MODE)]
        mode: String,

        /// Status codes treated as authentication failures [default: 401,403]
        #[arg(long, value_delimiter = ',')]
        auth_codes: Option<Vec<u16>>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },

    /// Run only the liveness stage
    Health {
        #[command(flatten)]
        target: TargetArgs,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    ragdiag_core::init_tracing(cli.json, level);

    let code = match cli.command {
        Commands::Diagnose {
            target,
            query,
            mode,
            auth_codes,
            output,
        } => {
            let mut config = target.to_config()?;
            config.query_text = query;
            config.query_mode = mode;
            let probes = default_probes(&config);
            cmd_run(&config, probes, auth_codes, output).await?
        }
        Commands::Health { target, output } => {
            let config = target.to_config()?;
            cmd_run(&config, liveness_probes(&config), None, output).await?
        }
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Run a probe sequence and print the diagnosis. Returns the exit code.
async fn cmd_run(
    config: &TargetConfig,
    probes: Vec<DynProbe<HttpTarget>>,
    auth_codes: Option<Vec<u16>>,
    output: OutputFormat,
) -> Result<i32> {
    let target = HttpTarget::new(config).context("Invalid target configuration")?;

    let mut engine_config =
        EngineConfig::default().with_probe_timeout(Duration::from_millis(config.timeout_ms));
    if let Some(codes) = auth_codes {
        engine_config = engine_config.with_auth_status_codes(codes);
    }
    let engine = DiagnosticEngine::new(engine_config);

    // Ctrl-C abandons the in-flight probe and still prints a diagnosis.
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    info!(target_url = %target.base_url(), probes = probes.len(), "Starting diagnosis");
    let started = Instant::now();
    let diagnosis = engine
        .diagnose_with_cancel(&target, &probes, &cancel)
        .await
        .context("Diagnosis could not run")?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let code = exit_code(diagnosis.fault_domain);
    let report = DiagnosisReport::new(target.base_url(), elapsed_ms, diagnosis);

    match output {
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Text => print!("{}", report.render_text()),
    }

    Ok(code)
}
