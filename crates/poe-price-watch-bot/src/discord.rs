//! Discord side of a bot: the serenity client, READY notifications and the
//! presence sink the poller writes to.
//!
//! serenity owns the gateway session (heartbeats, resume, reconnects and send
//! rate limits) and re-sends the last presence after a fresh identify.

use std::sync::{Arc, PoisonError, RwLock};

use serenity::all::{
    ActivityData, Client, Context, EventHandler, GatewayIntents, Ready, ResumedEvent,
    ShardManager,
};
use serenity::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use poe_price_watch::PresenceSink;

/// Discord rejects activity names longer than this.
pub const MAX_ACTIVITY_NAME_CHARS: usize = 128;

/// Connection milestones reported to the bot runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscordEvent {
    /// Logged in; fired again after every fresh identify.
    Ready { username: String },
    /// Session resumed after a dropped connection.
    Resumed,
}

/// Presence sink bound to the shard of a connected bot.
///
/// Cloneable; every clone points at the same shard. Updates fail until the
/// first READY has been seen.
#[derive(Clone)]
pub struct DiscordPresence {
    name: String,
    ctx: Arc<RwLock<Option<Context>>>,
}

impl DiscordPresence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ctx: Arc::new(RwLock::new(None)),
        }
    }

    pub fn is_connected(&self) -> bool {
        let guard = self.ctx.read().unwrap_or_else(PoisonError::into_inner);
        guard.is_some()
    }

    fn attach(&self, ctx: Context) {
        let mut guard = self.ctx.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(ctx);
    }
}

#[async_trait]
impl PresenceSink for DiscordPresence {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn set_watching(&self, text: &str) -> anyhow::Result<()> {
        let guard = self.ctx.read().unwrap_or_else(PoisonError::into_inner);
        let ctx = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("{} is not connected to Discord yet", self.name))?;
        ctx.set_activity(Some(ActivityData::watching(activity_name(text))));
        Ok(())
    }
}

/// Clip `text` to the longest activity name Discord accepts.
pub fn activity_name(text: &str) -> String {
    text.chars().take(MAX_ACTIVITY_NAME_CHARS).collect()
}

struct Handler {
    presence: DiscordPresence,
    events: mpsc::UnboundedSender<DiscordEvent>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            "[{}] Logged in as {} (ID: {})",
            self.presence.name,
            ready.user.name,
            ready.user.id
        );
        self.presence.attach(ctx);
        let _ = self.events.send(DiscordEvent::Ready {
            username: ready.user.name.clone(),
        });
    }

    async fn resume(&self, ctx: Context, _: ResumedEvent) {
        tracing::info!("[{}] gateway session resumed", self.presence.name);
        self.presence.attach(ctx);
        let _ = self.events.send(DiscordEvent::Resumed);
    }
}

/// A running serenity client for one bot.
pub struct DiscordConnection {
    pub presence: DiscordPresence,
    pub events: mpsc::UnboundedReceiver<DiscordEvent>,
    pub shard_manager: Arc<ShardManager>,
    pub task: JoinHandle<Result<(), serenity::Error>>,
}

/// Build the client for `token` and start it in the background.
///
/// The task ends with `Ok` after `shard_manager.shutdown_all()`, or with the
/// error that stopped the shards, e.g. a rejected token.
pub async fn connect(
    name: impl Into<String>,
    token: &str,
) -> Result<DiscordConnection, serenity::Error> {
    let presence = DiscordPresence::new(name);
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = Handler {
        presence: presence.clone(),
        events: tx,
    };

    let mut client = Client::builder(token, GatewayIntents::GUILDS)
        .event_handler(handler)
        .await?;
    let shard_manager = Arc::clone(&client.shard_manager);
    let task = tokio::spawn(async move { client.start().await });

    Ok(DiscordConnection {
        presence,
        events: rx,
        shard_manager,
        task,
    })
}
