//! Error types for a single scrape cycle.

use crate::types::Stage;

/// Everything that can abort a fetch cycle.
///
/// None of these are fatal to the process: the cycle is dropped and the
/// next poll tick tries again.
#[derive(thiserror::Error, Debug)]
pub enum ScrapeError {
    /// Request failed, timed out, or came back with a non-success status.
    #[error("Network error during {stage}: {detail}")]
    Network { stage: Stage, detail: String },

    #[error("CSRF token not found on landing page")]
    TokenNotFound,

    #[error("Currency switch rejected: error={error:?} currency={currency:?}")]
    CurrencySwitchRejected {
        error: Option<serde_json::Value>,
        currency: Option<String>,
    },

    #[error("Price element not found on {url}")]
    PriceElementNotFound { url: String },

    /// Response body could not be decoded.
    #[error("Parse error during {stage}: {detail}")]
    Parse { stage: Stage, detail: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
}

impl ScrapeError {
    pub(crate) fn network(stage: Stage, err: impl std::fmt::Display) -> Self {
        ScrapeError::Network {
            stage,
            detail: err.to_string(),
        }
    }

    /// The pipeline stage this error aborted, if it came from one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            ScrapeError::Network { stage, .. } | ScrapeError::Parse { stage, .. } => Some(*stage),
            ScrapeError::TokenNotFound => Some(Stage::ExtractToken),
            ScrapeError::CurrencySwitchRejected { .. } => Some(Stage::SwitchCurrency),
            ScrapeError::PriceElementNotFound { .. } => Some(Stage::ExtractPrice),
            ScrapeError::InvalidUrl(_) | ScrapeError::Client(_) => None,
        }
    }

    /// Short machine-friendly kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ScrapeError::Network { .. } => "network_error",
            ScrapeError::TokenNotFound => "token_missing",
            ScrapeError::CurrencySwitchRejected { .. } => "currency_switch_failed",
            ScrapeError::PriceElementNotFound { .. } => "price_element_missing",
            ScrapeError::Parse { .. } => "parse_error",
            ScrapeError::InvalidUrl(_) => "invalid_url",
            ScrapeError::Client(_) => "client_setup",
        }
    }
}

pub type ScrapeResult<T> = Result<T, ScrapeError>;
