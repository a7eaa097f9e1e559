//! poe-price-watch bots — publish scraped currency prices as Discord presence.

pub mod bot;
pub mod config;
pub mod discord;

pub use bot::{check_targets, BotRunner};
pub use config::{AppConfig, BotSpec, ConfigError, SiteConfig};
pub use discord::{DiscordEvent, DiscordPresence};
