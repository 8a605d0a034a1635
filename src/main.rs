//! Operator CLI for the fuzzy-Delphi round engine.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use fuzzy_delphi::adapters::{
    PostgresCaseRepository, PostgresCaseUnitOfWork, PostgresEvaluationReader,
    PostgresRoundResultReader, TracingEventPublisher,
};
use fuzzy_delphi::application::{
    AnalyzeRoundCommand, AnalyzeRoundError, AnalyzeRoundHandler, GetEvaluationProgressHandler,
    GetEvaluationProgressQuery, GetPendingReevaluationsHandler, GetPendingReevaluationsQuery,
    GetRoundResultsHandler, GetRoundResultsQuery, RoundSelection,
};
use fuzzy_delphi::config::{AppConfig, ConfigError, LoggingConfig};
use fuzzy_delphi::domain::foundation::{CaseId, CommandMetadata, UserId};

#[derive(Parser)]
#[command(name = "fuzzy-delphi")]
#[command(about = "Round convergence engine for fuzzy-Delphi studies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Acting user recorded on published events
    #[arg(long, global = true, env = "FUZZY_DELPHI_OPERATOR", default_value = "operator")]
    operator: UserId,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze the current round of a case
    Analyze {
        case_id: CaseId,

        /// Compute the verdict without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Show analyzed rounds of a case
    Results {
        case_id: CaseId,

        /// Only this round
        #[arg(long, conflicts_with = "latest")]
        round: Option<u32>,

        /// Only the most recent round
        #[arg(long)]
        latest: bool,
    },

    /// List what an evaluator still owes the current round
    Pending { case_id: CaseId, user_id: UserId },

    /// Per-evaluator progress on the current round
    Progress { case_id: CaseId },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("{0}")]
    Command(String),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

fn command_error(err: impl std::fmt::Display) -> CliError {
    CliError::Command(err.to_string())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.filter_directive()));
    let layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };
    tracing_subscriber::registry().with(filter).with(layer).init();
}

async fn connect(config: &AppConfig) -> Result<PgPool, CliError> {
    let pool = config.database.connect().await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }
    Ok(pool)
}

async fn run(cli: Cli, config: AppConfig) -> Result<serde_json::Value, CliError> {
    let pool = connect(&config).await?;
    let cases = Arc::new(PostgresCaseRepository::new(pool.clone()));
    let evaluations = Arc::new(PostgresEvaluationReader::new(pool.clone()));

    match cli.command {
        Commands::Analyze { case_id, dry_run } => {
            let handler = AnalyzeRoundHandler::new(
                Arc::new(PostgresCaseUnitOfWork::new(pool.clone())),
                Arc::new(TracingEventPublisher::new()),
            )
            .with_max_rounds(config.consensus.max_rounds);
            let cmd = AnalyzeRoundCommand { case_id, dry_run };
            let metadata = CommandMetadata::new(cli.operator).with_source("cli");

            match handler.handle(cmd, metadata).await {
                Ok(result) => Ok(json!({
                    "dry_run": result.dry_run,
                    "round_result": result.round_result,
                    "transition": result.transition,
                    "flagged": result.flagged,
                    "no_data": result.analysis.no_data,
                    "items": result.analysis.items,
                })),
                Err(AnalyzeRoundError::IncompleteData { round, missing, .. }) => Ok(json!({
                    "error": "INCOMPLETE_DATA",
                    "round": round,
                    "missing": missing,
                })),
                Err(err) => Err(command_error(err)),
            }
        }
        Commands::Results {
            case_id,
            round,
            latest,
        } => {
            let selection = match (round, latest) {
                (Some(n), _) => RoundSelection::Round(n),
                (None, true) => RoundSelection::Latest,
                (None, false) => RoundSelection::All,
            };
            let handler =
                GetRoundResultsHandler::new(cases, Arc::new(PostgresRoundResultReader::new(pool)));
            let results = handler
                .handle(GetRoundResultsQuery { case_id, selection })
                .await
                .map_err(command_error)?;
            Ok(serde_json::to_value(results)?)
        }
        Commands::Pending { case_id, user_id } => {
            let handler = GetPendingReevaluationsHandler::new(cases, evaluations);
            let pending = handler
                .handle(GetPendingReevaluationsQuery { case_id, user_id })
                .await
                .map_err(command_error)?;
            Ok(serde_json::to_value(pending)?)
        }
        Commands::Progress { case_id } => {
            let handler = GetEvaluationProgressHandler::new(cases, evaluations);
            let progress = handler
                .handle(GetEvaluationProgressQuery { case_id })
                .await
                .map_err(command_error)?;
            Ok(serde_json::to_value(progress)?)
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load().and_then(|c| c.validate().map(|_| c).map_err(Into::into)) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Configuration error: {}", err);
            return std::process::ExitCode::from(2);
        }
    };
    init_tracing(&config.logging);

    match run(cli, config).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => {
                println!("{}", text);
                std::process::ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("{}", CliError::from(err));
                std::process::ExitCode::FAILURE
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("{}", err);
            std::process::ExitCode::FAILURE
        }
    }
}
