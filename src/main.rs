//! CompliantGuard - HIPAA compliance scanning for GCP projects.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use compliantguard::api::{ApiServer, AppState};
use compliantguard::audit::AuditLog;
use compliantguard::auth::RegisterRequest;
use compliantguard::commands::{
    add_user, audit_report, import_opa, run_retention, scan_export, verify_audit, CommandError,
};
use compliantguard::compliance::{ComplianceReport, ScanRequest, ScanType};
use compliantguard::config::{ConfigLoader, GuardConfig};
use compliantguard::crypto::generate_key_hex;
use compliantguard::display;
use compliantguard::scanner::PolicyPack;
use compliantguard::store::Store;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScanTypeArg {
    Full,
    Quick,
    Custom,
}

impl From<ScanTypeArg> for ScanType {
    fn from(arg: ScanTypeArg) -> Self {
        match arg {
            ScanTypeArg::Full => ScanType::Full,
            ScanTypeArg::Quick => ScanType::Quick,
            ScanTypeArg::Custom => ScanType::Custom,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "compliantguard",
    about = "HIPAA compliance scanning for GCP infrastructure",
    version
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Config file to use instead of the default search paths.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server.
    Serve,
    /// Scan an exported asset inventory.
    Scan {
        /// Asset export (ListAssets response, JSON array or NDJSON).
        #[arg(long)]
        assets: PathBuf,
        /// Project the export belongs to.
        #[arg(long)]
        project: Option<String>,
        #[arg(long, value_enum, default_value_t = ScanTypeArg::Full)]
        scan_type: ScanTypeArg,
        /// Policy packs to run (repeatable).
        #[arg(long)]
        include: Vec<String>,
        /// Policy packs to skip (repeatable).
        #[arg(long)]
        exclude: Vec<String>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Build a report from `opa eval` output.
    ImportOpa {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        project: Option<String>,
        /// Policy pack the violations came from.
        #[arg(long, default_value = "hipaa_compliance")]
        pack: PolicyPack,
        #[arg(long)]
        json: bool,
    },
    /// Print a new random master key (hex).
    Keygen,
    /// Manage user accounts.
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Inspect the audit trail.
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },
    /// Apply data retention.
    Retention {
        #[command(subcommand)]
        command: RetentionCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create an account.
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        company: Option<String>,
    },
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Verify the audit hash chain.
    Verify,
    /// Summarize audit activity.
    Report {
        #[arg(long, default_value_t = 30)]
        days: i64,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RetentionCommands {
    /// Purge records past their retention period.
    Run,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<GuardConfig, CommandError> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    Ok(loader.load()?)
}

fn project_or_default(project: Option<String>, config: &GuardConfig) -> String {
    project
        .or_else(|| config.scanner.default_project.clone())
        .unwrap_or_else(|| "default".to_string())
}

fn emit_report(report: &ComplianceReport, json: bool) -> Result<(), CommandError> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        display::print_report(report);
    }
    Ok(())
}

async fn serve(config: GuardConfig) -> Result<(), CommandError> {
    let state = AppState::open(config).await?;
    let server = ApiServer::new(state);
    let cancel = server.cancel_token();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl-C, shutting down");
        }
        cancel.cancel();
    });

    server.run().await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<(), CommandError> {
    // Key generation must work before any configuration exists.
    let config = if matches!(cli.command, Commands::Keygen) {
        GuardConfig::default()
    } else {
        load_config(cli.config)?
    };

    match cli.command {
        Commands::Keygen => {
            println!("{}", generate_key_hex());
            Ok(())
        }
        Commands::Serve => serve(config).await,
        Commands::Scan {
            assets,
            project,
            scan_type,
            include,
            exclude,
            json,
        } => {
            let request = ScanRequest {
                project_id: project_or_default(project, &config),
                scan_type: scan_type.into(),
                include_policies: include,
                exclude_policies: exclude,
            };
            let report = scan_export(&assets, &request, config.scanner.scoring)?;
            emit_report(&report, json)
        }
        Commands::ImportOpa {
            input,
            project,
            pack,
            json,
        } => {
            let project_id = project_or_default(project, &config);
            let report = import_opa(&input, &project_id, pack, config.scanner.scoring)?;
            emit_report(&report, json)
        }
        Commands::User {
            command:
                UserCommands::Add {
                    email,
                    password,
                    first_name,
                    last_name,
                    company,
                },
        } => {
            let store = Store::open(&config.storage.database_path).await?;
            let request = RegisterRequest {
                first_name,
                last_name,
                email,
                password,
                company,
            };
            let user = add_user(&store, &config, request).await?;
            println!("{} {} ({})", "Created".green().bold(), user.email, user.user_id);
            Ok(())
        }
        Commands::Audit { command } => {
            let audit = AuditLog::open(&config.storage.database_path)
                .await?
                .with_config(config.audit.clone());
            match command {
                AuditCommands::Verify => {
                    let result = verify_audit(&audit).await;
                    if let Ok(verification) = &result {
                        display::print_chain_verification(verification);
                    }
                    result.map(|_| ())
                }
                AuditCommands::Report { days, json } => {
                    let report = audit_report(&audit, days, Utc::now()).await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    } else {
                        display::print_audit_report(&report);
                    }
                    Ok(())
                }
            }
        }
        Commands::Retention {
            command: RetentionCommands::Run,
        } => {
            let path = &config.storage.database_path;
            let store = Store::open(path).await?;
            let audit = AuditLog::open(path).await?.with_config(config.audit.clone());
            let summary = run_retention(&store, &audit, &config, Utc::now()).await?;
            display::print_retention_summary(&summary);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
