pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use changegate_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "changegate",
    about = "Changegate operator CLI",
    long_about = "Analyze network change requests, drive approvals, and run implement/rollback sequences against the enforcement path.",
    after_help = "Examples:\n  changegate seed\n  changegate analyze SNOW-48213 --mode manual\n  changegate approve <ticket> <step> --approver alex\n  changegate implement <ticket>"
)]
pub struct Cli {
    /// Path to a changegate.toml config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database URL from config.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Override the log level from config.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run migrations and list the seeded change references")]
    Seed,
    #[command(about = "Run the analysis pipeline for a change reference and create a ticket")]
    Analyze {
        reference: String,
        #[arg(long, default_value = "manual", help = "Ticket mode: manual or automatic")]
        mode: String,
        #[arg(long, help = "Emit the full ticket as JSON")]
        json: bool,
    },
    #[command(about = "Show one ticket")]
    Show {
        ticket_id: String,
        #[arg(long, help = "Emit the full ticket as JSON")]
        json: bool,
    },
    #[command(about = "List tickets, optionally filtered by status")]
    List {
        #[arg(long, help = "Filter by ticket status (e.g. analyzed, pending_approval)")]
        status: Option<String>,
    },
    #[command(about = "Approve one approval step")]
    Approve {
        ticket_id: String,
        step_id: String,
        #[arg(long, default_value = "operator")]
        approver: String,
        #[arg(long)]
        comment: Option<String>,
    },
    #[command(about = "Reject one approval step (terminates the ticket)")]
    Reject {
        ticket_id: String,
        step_id: String,
        #[arg(long, default_value = "operator")]
        approver: String,
        #[arg(long)]
        comment: String,
    },
    #[command(about = "Apply the generated rules to each enforcement point in order")]
    Implement { ticket_id: String },
    #[command(about = "Remove applied rules in reverse order")]
    Rollback { ticket_id: String },
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides {
            database_url: cli.database_url.clone(),
            log_level: cli.log_level.clone(),
        },
    }) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config);

    let result = match cli.command {
        Command::Seed => commands::seed::run(&config).await,
        Command::Analyze { reference, mode, json } => {
            commands::analyze::run(&config, &reference, &mode, json).await
        }
        Command::Show { ticket_id, json } => commands::show::run(&config, &ticket_id, json).await,
        Command::List { status } => commands::show::list(&config, status.as_deref()).await,
        Command::Approve { ticket_id, step_id, approver, comment } => {
            commands::lifecycle::approve(&config, &ticket_id, &step_id, &approver, comment).await
        }
        Command::Reject { ticket_id, step_id, approver, comment } => {
            commands::lifecycle::reject(&config, &ticket_id, &step_id, &approver, comment).await
        }
        Command::Implement { ticket_id } => commands::lifecycle::implement(&config, &ticket_id).await,
        Command::Rollback { ticket_id } => commands::lifecycle::rollback(&config, &ticket_id).await,
    };

    match result {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}
