use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "vfl")]
#[command(about = "Vessel fuel ledger CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (vessel -> fleet overlay -> local overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run the ledger and validator over one period; prints JSON, never journals
    Reconcile {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Prior closing table (JSON RobTable)
        #[arg(long)]
        opening: String,

        /// Period to reconcile (JSON ReportPeriod)
        #[arg(long)]
        period: String,

        /// Previous period, for prior-interval rules
        #[arg(long)]
        prior: Option<String>,

        /// Fail on config keys no component reads
        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Run only the validation rules over one period; prints findings as JSON
    Validate {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        period: String,

        #[arg(long)]
        prior: Option<String>,

        #[arg(long, default_value_t = false)]
        strict_config: bool,
    },

    /// Submit periods in order through a session; exits non-zero if any is blocked
    Replay {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Opening table of the leg (JSON RobTable)
        #[arg(long)]
        opening: String,

        /// Append accepted periods to this hash-chained JSONL audit log
        #[arg(long)]
        audit: Option<String>,

        #[arg(long, default_value_t = false)]
        strict_config: bool,

        /// Period files in submission order
        #[arg(required = true)]
        periods: Vec<String>,
    },

    /// Verify an audit log's hash chain
    AuditVerify {
        path: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = vfl_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Reconcile {
            config_paths,
            opening,
            period,
            prior,
            strict_config,
        } => commands::ledger::reconcile(
            &config_paths,
            &opening,
            &period,
            prior.as_deref(),
            strict_config,
        )?,

        Commands::Validate {
            config_paths,
            period,
            prior,
            strict_config,
        } => commands::ledger::validate(&config_paths, &period, prior.as_deref(), strict_config)?,

        Commands::Replay {
            config_paths,
            opening,
            audit,
            strict_config,
            periods,
        } => commands::ledger::replay(
            &config_paths,
            &opening,
            audit.as_deref(),
            &periods,
            strict_config,
        )?,

        Commands::AuditVerify { path } => commands::audit_verify(&path)?,
    }

    Ok(())
}
