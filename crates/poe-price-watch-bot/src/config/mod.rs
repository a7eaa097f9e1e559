//! Configuration loading and resolution.
//!
//! Bot tokens are required and come from the environment (optionally seeded
//! from a `.env` file). Everything else has a default.

use std::time::Duration;

use poe_price_watch::session::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
use poe_price_watch::{SessionConfig, Target};

pub const BOT_1_TOKEN_VAR: &str = "BOT_1_TOKEN";
pub const BOT_2_TOKEN_VAR: &str = "BOT_2_TOKEN";
pub const BASE_URL_VAR: &str = "PRICE_WATCH_BASE_URL";
pub const POLL_SECS_VAR: &str = "PRICE_WATCH_POLL_SECS";
pub const HTTP_TIMEOUT_SECS_VAR: &str = "PRICE_WATCH_HTTP_TIMEOUT_SECS";

const DEFAULT_POLL_SECS: u64 = 180;
const MIN_POLL_SECS: u64 = 10;

const POE_LABEL: &str = "Path of Exile";
const POE_PATH: &str = "/game/path-of-exile/currency.html";
const POE2_LABEL: &str = "Path of Exile 2";
const POE2_PATH: &str = "/game/path-of-exile-2-currency/currency.html";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Where and how often to scrape. Needs no credentials.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    pub base_url: String,
    pub poll_period: Duration,
    pub http_timeout: Duration,
}

impl SiteConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = read_string(&lookup, BASE_URL_VAR)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let poll_secs = read_u64(&lookup, POLL_SECS_VAR, DEFAULT_POLL_SECS);
        let timeout_secs = read_u64(&lookup, HTTP_TIMEOUT_SECS_VAR, DEFAULT_TIMEOUT_SECS);

        let mut site = Self {
            base_url: String::new(),
            poll_period: Duration::from_secs(DEFAULT_POLL_SECS),
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
        };
        site.set_base_url(&base_url)?;
        site.set_poll_secs(poll_secs);
        Ok(site)
    }

    /// Replace the site root; only http(s) URLs are accepted.
    pub fn set_base_url(&mut self, raw: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            name: BASE_URL_VAR,
            value: raw.to_string(),
        };
        let url = url_parse(raw).ok_or_else(invalid)?;
        self.base_url = url;
        Ok(())
    }

    /// Set the poll period, clamped to a floor to stay polite to the site.
    pub fn set_poll_secs(&mut self, secs: u64) {
        if secs < MIN_POLL_SECS {
            tracing::warn!("poll period {secs}s is too short, using {MIN_POLL_SECS}s");
        }
        self.poll_period = Duration::from_secs(secs.max(MIN_POLL_SECS));
    }

    /// The two monitored listings, in bot order.
    pub fn targets(&self) -> [Target; 2] {
        [
            Target::new(POE_LABEL, format!("{}{}", self.base_url, POE_PATH)),
            Target::new(POE2_LABEL, format!("{}{}", self.base_url, POE2_PATH)),
        ]
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            base_url: self.base_url.clone(),
            timeout: self.http_timeout,
            ..SessionConfig::default()
        }
    }
}

/// One bot identity and the listing it reports on.
#[derive(Clone)]
pub struct BotSpec {
    pub name: String,
    pub token: String,
    pub target: Target,
}

impl std::fmt::Debug for BotSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotSpec")
            .field("name", &self.name)
            .field("token", &"<redacted>")
            .field("target", &self.target)
            .finish()
    }
}

/// Full configuration for the `run` command.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub site: SiteConfig,
    pub bots: Vec<BotSpec>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let site = SiteConfig::from_lookup(&lookup)?;
        let token_1 = read_string(&lookup, BOT_1_TOKEN_VAR)
            .ok_or(ConfigError::MissingVar(BOT_1_TOKEN_VAR))?;
        let token_2 = read_string(&lookup, BOT_2_TOKEN_VAR)
            .ok_or(ConfigError::MissingVar(BOT_2_TOKEN_VAR))?;

        let [t1, t2] = site.targets();
        let bots = vec![
            BotSpec {
                name: "bot-1".to_string(),
                token: token_1,
                target: t1,
            },
            BotSpec {
                name: "bot-2".to_string(),
                token: token_2,
                target: t2,
            },
        ];

        Ok(Self { site, bots })
    }

    /// Re-derive bot targets after the site config changed.
    pub fn refresh_targets(&mut self) {
        for (bot, target) in self.bots.iter_mut().zip(self.site.targets()) {
            bot.target = target;
        }
    }
}

/// Load `.env` into the process environment if present.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!("Ignoring unreadable .env file: {e}"),
    }
}

fn url_parse(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let parsed = url::Url::parse(trimmed).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return None;
    }
    Some(trimmed.to_string())
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default_value: u64) -> u64 {
    match read_string(lookup, name) {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!("{name}={raw} is not a number, using {default_value}");
            default_value
        }),
        None => default_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_with_tokens() {
        let cfg = AppConfig::from_lookup(env(&[
            (BOT_1_TOKEN_VAR, "aaa"),
            (BOT_2_TOKEN_VAR, "bbb"),
        ]))
        .unwrap();

        assert_eq!(cfg.site.base_url, "https://cnlgaming.com");
        assert_eq!(cfg.site.poll_period, Duration::from_secs(180));
        assert_eq!(cfg.site.http_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(cfg.bots.len(), 2);
        assert_eq!(cfg.bots[0].token, "aaa");
        assert_eq!(
            cfg.bots[0].target.url,
            "https://cnlgaming.com/game/path-of-exile/currency.html"
        );
        assert_eq!(cfg.bots[1].token, "bbb");
        assert_eq!(
            cfg.bots[1].target.url,
            "https://cnlgaming.com/game/path-of-exile-2-currency/currency.html"
        );
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = AppConfig::from_lookup(env(&[(BOT_1_TOKEN_VAR, "aaa")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(BOT_2_TOKEN_VAR)));

        let err = AppConfig::from_lookup(env(&[
            (BOT_1_TOKEN_VAR, "   "),
            (BOT_2_TOKEN_VAR, "bbb"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(BOT_1_TOKEN_VAR)));
    }

    #[test]
    fn test_site_needs_no_tokens() {
        let site = SiteConfig::from_lookup(env(&[])).unwrap();
        assert_eq!(site.targets()[0].label, "Path of Exile");
        assert_eq!(site.targets()[1].label, "Path of Exile 2");
    }

    #[test]
    fn test_overrides() {
        let site = SiteConfig::from_lookup(env(&[
            (BASE_URL_VAR, "http://127.0.0.1:8080/"),
            (POLL_SECS_VAR, "60"),
            (HTTP_TIMEOUT_SECS_VAR, "5"),
        ]))
        .unwrap();
        assert_eq!(site.base_url, "http://127.0.0.1:8080");
        assert_eq!(site.poll_period, Duration::from_secs(60));
        assert_eq!(site.http_timeout, Duration::from_secs(5));
        assert_eq!(
            site.targets()[0].url,
            "http://127.0.0.1:8080/game/path-of-exile/currency.html"
        );
        assert_eq!(site.session_config().base_url, "http://127.0.0.1:8080");
    }

    #[test]
    fn test_bad_numbers_fall_back() {
        let site = SiteConfig::from_lookup(env(&[(POLL_SECS_VAR, "2")])).unwrap();
        assert_eq!(site.poll_period, Duration::from_secs(MIN_POLL_SECS));

        let site = SiteConfig::from_lookup(env(&[(POLL_SECS_VAR, "soon")])).unwrap();
        assert_eq!(site.poll_period, Duration::from_secs(DEFAULT_POLL_SECS));
    }

    #[test]
    fn test_bad_base_url_rejected() {
        for raw in ["ftp://cnlgaming.com", "cnlgaming.com", "http://"] {
            let err = SiteConfig::from_lookup(env(&[(BASE_URL_VAR, raw)])).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { name: BASE_URL_VAR, .. }));
        }
    }

    #[test]
    fn test_refresh_targets_after_override() {
        let mut cfg = AppConfig::from_lookup(env(&[
            (BOT_1_TOKEN_VAR, "aaa"),
            (BOT_2_TOKEN_VAR, "bbb"),
        ]))
        .unwrap();
        cfg.site.set_base_url("http://localhost:9000").unwrap();
        cfg.refresh_targets();
        assert_eq!(
            cfg.bots[1].target.url,
            "http://localhost:9000/game/path-of-exile-2-currency/currency.html"
        );
        assert_eq!(cfg.bots[1].token, "bbb");
    }

    #[test]
    fn test_bot_spec_debug_redacts_token() {
        let spec = BotSpec {
            name: "bot-1".to_string(),
            token: "super-secret".to_string(),
            target: Target::new("x", "https://example.com"),
        };
        assert!(!format!("{spec:?}").contains("super-secret"));
    }
}
