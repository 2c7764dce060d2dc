use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use engagement_ai::admin::AdminService;
use engagement_ai::config::AppConfig;
use engagement_ai::direct::DirectService;
use engagement_ai::display::{format_confidence, phase_label};
use engagement_ai::export::{ExportFormat, HistoryExporter, EXPORT_DIR_FORMAT};
use engagement_ai::logging::{init_logging, OperationTimer};
use engagement_ai::metrics::MetricsCollector;
use engagement_ai::model::HttpLanguageModel;
use engagement_ai::models::Classification;
use engagement_ai::moderation::{ModerationDecision, ModerationService};
use engagement_ai::phases;
use engagement_ai::service::{AiService, ServiceSettings};
use engagement_ai::store::{DataSource, RecordStore};
use engagement_ai::testing::AiTester;
use engagement_ai::webhook::WebhookClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra configuration file layered over the defaults
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a question on behalf of a unit
    Ask {
        /// Unit id
        #[arg(short, long)]
        unit: String,

        /// Question text
        #[arg(short, long)]
        query: String,
    },
    /// Run a test query and report latency, confidence and sources
    Test {
        /// Unit id
        #[arg(short, long)]
        unit: String,

        /// Question text
        #[arg(short, long)]
        query: String,

        /// Send the query to the test webhook instead of the model
        #[arg(long)]
        webhook: bool,
    },
    /// Suggest a moderation decision for a stored comment
    Classify {
        /// Comment id
        #[arg(short, long)]
        comment: String,
    },
    /// Apply a moderation decision to a stored comment
    Moderate {
        /// Comment id
        #[arg(short, long)]
        comment: String,

        /// approved, rejected or pending
        #[arg(short = 'd', long)]
        decision: String,

        /// Use the model's suggestion for the remaining fields
        #[arg(long)]
        assisted: bool,
    },
    /// Show the comments of a unit grouped by moderation status
    Board {
        /// Unit id
        #[arg(short, long)]
        unit: String,
    },
    /// Suggest engagement actions for a unit
    Recommend {
        /// Unit id
        #[arg(short, long)]
        unit: String,
    },
    /// List phases in progression order
    Phases,
    /// Move a unit to another phase
    Advance {
        /// Unit id
        #[arg(short, long)]
        unit: String,

        /// Target phase id
        #[arg(short, long)]
        phase: String,
    },
    /// Show the reply suggestions stored on a Direct conversation
    Suggestions {
        /// Conversation id
        #[arg(long)]
        conversation: String,
    },
    /// Export the interaction history of a unit
    ExportHistory {
        /// Unit id
        #[arg(short, long)]
        unit: String,

        /// Output format (csv or json)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output_dir: String,

        /// Maximum number of entries
        #[arg(short, long, default_value = "1000")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging; the guard flushes the file writer on exit
    let _log_guard = init_logging(&config.logging)?;
    if let Err(e) = MetricsCollector::init() {
        warn!(error = %e, "Metrics recorder already installed");
    }

    info!("Starting engagement-ai");

    let store = DataSource::open(&config.store).await?;

    match cli.command {
        Commands::Ask { unit, query } => {
            let service = ai_service(&config, store)?;
            let response = service.generate_response(&unit, &query).await?;
            info!(confidence = %format_confidence(response.confidence), "Answer generated");
            emit(&response)?;
        }
        Commands::Test { unit, query, webhook } => {
            let service = ai_service(&config, store)?;
            let client = if webhook {
                Some(WebhookClient::new(&config.webhook)?)
            } else {
                None
            };
            let tester = AiTester::new(service, client);
            let outcome = if webhook {
                tester.test_via_webhook(&unit, &query).await
            } else {
                tester.test_ai(&unit, &query).await
            };
            match outcome {
                Ok(result) => emit(&result)?,
                Err(failure) => {
                    emit(&failure.result)?;
                    return Err(failure.into());
                }
            }
        }
        Commands::Classify { comment } => {
            let moderation = ModerationService::new(ai_service(&config, store)?);
            let suggestion = moderation.suggest(&comment).await?;
            emit(&suggestion)?;
        }
        Commands::Moderate {
            comment,
            decision,
            assisted,
        } => {
            let classification: Classification = decision.parse()?;
            let moderation = ModerationService::new(ai_service(&config, store)?);
            let decision = if assisted {
                let suggestion = moderation.suggest(&comment).await?;
                ModerationDecision {
                    classification,
                    ..ModerationDecision::from(suggestion)
                }
            } else {
                ModerationDecision::manual(classification)
            };
            let updated = moderation.apply(&comment, decision).await?;
            emit(&updated)?;
        }
        Commands::Board { unit } => {
            let moderation = ModerationService::new(ai_service(&config, store)?);
            let board = moderation.board(&unit).await?;
            info!(
                pending = board.pending.len(),
                approved = board.approved.len(),
                rejected = board.rejected.len(),
                "Comment board loaded"
            );
            emit(&board)?;
        }
        Commands::Recommend { unit } => {
            let service = ai_service(&config, store)?;
            let recommendations = service.generate_unit_recommendations(&unit).await?;
            emit(&recommendations)?;
        }
        Commands::Phases => list_phases(store.as_ref()).await?,
        Commands::Advance { unit, phase } => {
            let updated = AdminService::new(store).advance_unit_phase(&unit, &phase).await?;
            emit(&updated)?;
        }
        Commands::Suggestions { conversation } => {
            let suggestions = DirectService::new(store).reply_suggestions(&conversation).await?;
            emit(&suggestions)?;
        }
        Commands::ExportHistory {
            unit,
            format,
            output_dir,
            limit,
        } => export_history(store, &unit, &format, &output_dir, limit).await?,
    }

    Ok(())
}

fn ai_service(config: &AppConfig, store: Arc<dyn RecordStore>) -> Result<AiService> {
    let model = HttpLanguageModel::new(&config.model)?;
    Ok(AiService::new(store, Arc::new(model), ServiceSettings::from_config(config)))
}

/// Print a value as pretty JSON on stdout
fn emit<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

async fn list_phases(store: &dyn RecordStore) -> Result<()> {
    let mut phases = store.list_phases().await?;
    phases::sort_by_progression(&mut phases);

    let rows: Vec<_> = phases
        .iter()
        .map(|phase| {
            serde_json::json!({
                "id": phase.id,
                "order": phase.order,
                "name": phase.name,
                "label": phase_label(&phase.name),
                "active": phase.active,
            })
        })
        .collect();
    emit(&rows)
}

async fn export_history(
    store: Arc<dyn RecordStore>,
    unit_id: &str,
    format: &str,
    output_dir: &str,
    limit: usize,
) -> Result<()> {
    let timer = OperationTimer::new("export_history");
    let format: ExportFormat = format.parse()?;
    let timestamp = Local::now().format(EXPORT_DIR_FORMAT).to_string();

    let exported = HistoryExporter::new(store)
        .export_unit_history(unit_id, format, &PathBuf::from(output_dir), &timestamp, limit)
        .await?;
    match exported {
        Some(path) => info!(path = %path.display(), "Export complete"),
        None => warn!(unit_id, "Nothing to export"),
    }
    timer.finish();
    Ok(())
}
