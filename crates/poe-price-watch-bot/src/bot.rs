//! Bot lifecycle: a Discord connection plus the price poller it feeds.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use poe_price_watch::{PresenceSink, PricePipeline, PricePoller, ScrapeResult, Target};
use serenity::all::ShardManager;

use crate::config::BotSpec;
use crate::discord::{self, DiscordEvent};

const DISCORD_CLOSE_GRACE: Duration = Duration::from_secs(5);

/// One bot: connects to Discord and starts its poller on every READY.
pub struct BotRunner {
    name: String,
    poller: PricePoller,
    events: mpsc::UnboundedReceiver<DiscordEvent>,
    shard_manager: Arc<ShardManager>,
    task: JoinHandle<Result<(), serenity::Error>>,
}

impl BotRunner {
    /// Start the Discord client. The poller waits for the first READY.
    pub async fn launch(
        spec: BotSpec,
        pipeline: PricePipeline,
        poll_period: Duration,
    ) -> anyhow::Result<Self> {
        let conn = discord::connect(spec.name.clone(), &spec.token)
            .await
            .map_err(|e| anyhow::anyhow!("[{}] could not build Discord client: {e}", spec.name))?;
        let presence: Arc<dyn PresenceSink> = Arc::new(conn.presence);
        let poller = PricePoller::new(spec.target, pipeline, presence).with_period(poll_period);

        tracing::info!("[{}] launching for {}", spec.name, poller.target());
        Ok(Self {
            name: spec.name,
            poller,
            events: conn.events,
            shard_manager: conn.shard_manager,
            task: conn.task,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Drive the bot until shutdown or until the Discord client stops.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let finished = loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("[{}] shutting down", self.name);
                    break None;
                }
                Some(event) = self.events.recv() => match event {
                    DiscordEvent::Ready { username } => {
                        tracing::info!("[{}] ready as {username}", self.name);
                        if !self.poller.start() {
                            tracing::debug!("[{}] poller already running after reconnect", self.name);
                        }
                    }
                    DiscordEvent::Resumed => {
                        tracing::debug!("[{}] resumed, poller keeps its schedule", self.name);
                    }
                },
                result = &mut self.task => break Some(result),
            }
        };

        self.poller.stop().await;

        let result = match finished {
            Some(result) => result,
            None => {
                self.shard_manager.shutdown_all().await;
                match tokio::time::timeout(DISCORD_CLOSE_GRACE, &mut self.task).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!("[{}] Discord client did not stop in time, aborting", self.name);
                        self.task.abort();
                        return Ok(());
                    }
                }
            }
        };

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!("[{}] Discord client failed: {e}", self.name)),
            Err(e) => Err(anyhow::anyhow!("[{}] Discord task panicked: {e}", self.name)),
        }
    }
}

/// Run one fetch per target without touching Discord.
pub async fn check_targets(
    pipeline: &PricePipeline,
    targets: &[Target],
) -> Vec<(Target, ScrapeResult<String>)> {
    let mut results = Vec::with_capacity(targets.len());
    for target in targets {
        let result = pipeline.fetch_price(target).await;
        results.push((target.clone(), result));
    }
    results
}
