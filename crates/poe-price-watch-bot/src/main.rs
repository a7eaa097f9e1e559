//! poe-price-watch bots — entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tokio::sync::broadcast;

use poe_price_watch::{PricePipeline, ScrapeSession};
use poe_price_watch_bot::config::{load_dotenv, AppConfig, SiteConfig};
use poe_price_watch_bot::{check_targets, BotRunner};

#[derive(Parser)]
#[command(
    name = "poe-price-watch-bot",
    about = "Publish cnlgaming.com currency prices as Discord bot presence",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Seconds between two price updates (overrides PRICE_WATCH_POLL_SECS).
    #[arg(long, global = true)]
    poll_secs: Option<u64>,

    /// Site root to scrape (overrides PRICE_WATCH_BASE_URL).
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect both bots and keep their status updated (default).
    Run,

    /// Scrape every target once and print the result. Needs no bot tokens.
    Check,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);
    load_dotenv();

    match &cli.command {
        None | Some(Commands::Run) => run(&cli).await,
        Some(Commands::Check) => check(&cli).await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "poe-price-watch-bot", &mut std::io::stdout());
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn apply_overrides(cli: &Cli, site: &mut SiteConfig) -> anyhow::Result<()> {
    if let Some(base_url) = &cli.base_url {
        site.set_base_url(base_url)?;
    }
    if let Some(secs) = cli.poll_secs {
        site.set_poll_secs(secs);
    }
    Ok(())
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = AppConfig::from_env()?;
    apply_overrides(cli, &mut config.site)?;
    config.refresh_targets();

    tracing::info!(
        "poe-price-watch starting: {} bot(s), poll every {}s, site {}",
        config.bots.len(),
        config.site.poll_period.as_secs(),
        config.site.base_url
    );

    let session = Arc::new(ScrapeSession::new(config.site.session_config())?);
    let pipeline = PricePipeline::new(Arc::clone(&session));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut runners = Vec::with_capacity(config.bots.len());
    for spec in config.bots {
        let runner = BotRunner::launch(spec, pipeline.clone(), config.site.poll_period).await?;
        runners.push((runner, shutdown_tx.subscribe()));
    }

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
            return;
        }
        tracing::info!("received shutdown signal, bots are shutting down");
        let _ = signal_tx.send(());
    });

    let results = futures::future::join_all(
        runners
            .into_iter()
            .map(|(runner, shutdown)| runner.run(shutdown)),
    )
    .await;

    drop(pipeline);
    session.close();

    let mut failed = 0;
    for result in results {
        if let Err(e) = result {
            tracing::error!("{e}");
            failed += 1;
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} bot(s) stopped with an error");
    }
    Ok(())
}

async fn check(cli: &Cli) -> anyhow::Result<()> {
    let mut site = SiteConfig::from_env()?;
    apply_overrides(cli, &mut site)?;

    let session = Arc::new(ScrapeSession::new(site.session_config())?);
    let pipeline = PricePipeline::new(Arc::clone(&session));

    let results = check_targets(&pipeline, &site.targets()).await;
    drop(pipeline);
    session.close();

    let mut failed = 0;
    for (target, result) in &results {
        match result {
            Ok(price) => println!("{}: {price}", target.label),
            Err(e) => {
                let stage = e.stage().map(|s| s.as_str()).unwrap_or("setup");
                println!("{}: FAILED at {stage} ({e})", target.label);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} target(s) failed", results.len());
    }
    Ok(())
}
