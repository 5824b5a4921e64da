use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;

use rivalscope::pipeline::{Orchestrator, PipelineKind};
use rivalscope::Settings;

#[derive(Parser)]
#[command(
    name = "rivalscope",
    about = "Competitive-intelligence scraper: dashboard metrics, Maps reviews, sentiment analysis",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every enabled pipeline in order, ending with sentiment analysis
    All,
    /// Keyword / backlink / top-page exports for the target and competitors
    Semrush,
    /// Traffic overview, sources and journey captures per domain
    Traffic,
    /// Harvest Maps reviews for every competitor query
    Reviews,
    /// Analyze the stored review set (no browser needed)
    Sentiment,
    /// Print the resolved configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let settings = Settings::load()?;

    if let Command::Config = cli.command {
        println!("{}", serde_json::to_string_pretty(&settings)?);
        return Ok(());
    }

    let kinds = match cli.command {
        Command::All => PipelineKind::enabled(&settings),
        Command::Semrush => vec![PipelineKind::Semrush],
        Command::Traffic => vec![PipelineKind::Traffic],
        Command::Reviews => vec![PipelineKind::Reviews],
        Command::Sentiment => vec![PipelineKind::Sentiment],
        Command::Config => unreachable!(),
    };

    // Ctrl-c requests a graceful stop: pipelines check the flag between
    // steps and keep whatever they have already persisted.
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 interrupt received, finishing current step");
                cancel.store(true, Ordering::Relaxed);
            }
        });
    }

    let orchestrator = Orchestrator::new(settings, cancel);
    let summary = orchestrator.run(&kinds).await;
    summary.log();
    if summary.exit_code() != 0 {
        std::process::exit(summary.exit_code());
    }
    Ok(())
}
