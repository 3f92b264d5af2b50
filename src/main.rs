use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::error;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod aggregate;
mod config;
mod db;
mod engine;
mod error;
mod issues;
mod models;
mod normalize;
mod prescription;
mod regression;
mod report;
mod server;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "destination-diagnostic")]
#[command(
    about = "Tourism destination diagnostic scoring and training prescription engine",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo destination, catalogs and assessment
    Seed,
    /// Import indicator values for an assessment from a CSV file
    Import {
        #[arg(long)]
        assessment_id: Uuid,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score an assessment and prescribe training
    Calculate {
        #[arg(long)]
        assessment_id: Uuid,
        /// Also write a markdown summary to this path
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List open regression alerts for a destination
    Alerts {
        #[arg(long)]
        destination_id: Uuid,
    },
    /// Serve the calculation endpoint over HTTP
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load()?;
    let database_url = config::database_url()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!(
                "Seed data inserted (assessment {}).",
                db::SEED_ASSESSMENT_ID
            );
        }
        Commands::Import { assessment_id, csv } => {
            let imported = db::import_csv(&pool, assessment_id, &csv).await?;
            println!(
                "Imported {imported} indicator values from {}.",
                csv.display()
            );
        }
        Commands::Calculate { assessment_id, out } => {
            let outcome = engine::calculate(&pool, assessment_id)
                .await
                .with_context(|| format!("calculation of assessment {assessment_id} failed"))?;
            let result = &outcome.result;

            println!("Pillar scores:");
            for pillar in &result.pillar_scores {
                println!(
                    "- {} {:.2} ({})",
                    pillar.pillar.full_name(),
                    pillar.score,
                    pillar.severity.label()
                );
            }
            if let (Some(pillar), Some(score)) = (result.critical_pillar, result.critical_score) {
                println!("Critical pillar: {} ({score:.2})", pillar.full_name());
            }
            println!(
                "{} issues, {} recommendations.",
                result.issues_created, result.recommendations_created
            );
            for alert in &outcome.alerts {
                println!("Alert: {}", alert.message);
            }

            if let Some(out) = out {
                std::fs::write(&out, report::build_report(&outcome))
                    .with_context(|| format!("failed to write {}", out.display()))?;
                println!("Report written to {}.", out.display());
            }
        }
        Commands::Alerts { destination_id } => {
            let alerts = db::fetch_open_alerts(&pool, destination_id).await?;
            if alerts.is_empty() {
                println!("No open regression alerts.");
                return Ok(());
            }

            for alert in alerts {
                println!(
                    "- [{}] {} cycles{}: {}",
                    alert.pillar,
                    alert.consecutive_cycles,
                    if alert.is_read { "" } else { " (unread)" },
                    alert.message
                );
            }
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or(config.server.bind);
            let runtime = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || server::run(&bind, pool, runtime))
                .await
                .context("HTTP server thread panicked")??;
        }
    }

    Ok(())
}
