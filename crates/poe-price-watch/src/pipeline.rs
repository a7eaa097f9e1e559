//! One end-to-end price fetch per target.
//!
//! Stages run strictly in order and never go back:
//!
//! 1. `FetchLanding`   GET the site root.
//! 2. `ExtractToken`   read the CSRF meta tag.
//! 3. `SwitchCurrency` set the token header and switch the session to EUR.
//! 4. `FetchTarget`    GET the listing page.
//! 5. `ExtractPrice`   first `h4`, trimmed.
//!
//! Any failure ends the cycle with the error of the stage that failed.

use std::sync::Arc;

use crate::currency::{switch_currency, TARGET_CURRENCY};
use crate::error::{ScrapeError, ScrapeResult};
use crate::price::extract_price;
use crate::session::ScrapeSession;
use crate::token::extract_csrf_token;
use crate::types::{Stage, Target};

/// Runs fetch cycles over a shared [`ScrapeSession`].
#[derive(Clone)]
pub struct PricePipeline {
    session: Arc<ScrapeSession>,
    currency: String,
}

impl PricePipeline {
    pub fn new(session: Arc<ScrapeSession>) -> Self {
        Self {
            session,
            currency: TARGET_CURRENCY.to_string(),
        }
    }

    pub fn session(&self) -> &Arc<ScrapeSession> {
        &self.session
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Run one full cycle for `target` and log how it ended.
    pub async fn fetch_price(&self, target: &Target) -> ScrapeResult<String> {
        let result = self.run_stages(target).await;
        match &result {
            Ok(price) => {
                tracing::info!("[{}] price fetched in {}: '{}'", target.label, self.currency, price);
            }
            Err(e) => {
                tracing::warn!(
                    "[{}] fetch aborted at {} ({}): {}",
                    target.label,
                    e.stage().map(Stage::as_str).unwrap_or("setup"),
                    e.kind(),
                    e
                );
            }
        }
        result
    }

    async fn run_stages(&self, target: &Target) -> ScrapeResult<String> {
        let session = self.session.as_ref();

        tracing::debug!("[{}] {}", target.label, Stage::FetchLanding);
        let landing = session
            .get_text(session.base_url().as_str(), Stage::FetchLanding)
            .await?;

        tracing::debug!("[{}] {}", target.label, Stage::ExtractToken);
        let token = extract_csrf_token(&landing).ok_or(ScrapeError::TokenNotFound)?;

        tracing::debug!("[{}] {}", target.label, Stage::SwitchCurrency);
        session.set_csrf_token(&token)?;
        switch_currency(session, &self.currency).await?;

        tracing::debug!("[{}] {} {}", target.label, Stage::FetchTarget, target.url);
        let page = session.get_text(&target.url, Stage::FetchTarget).await?;

        tracing::debug!("[{}] {}", target.label, Stage::ExtractPrice);
        match extract_price(&page) {
            Some(price) if !price.is_empty() => Ok(price),
            _ => Err(ScrapeError::PriceElementNotFound {
                url: target.url.clone(),
            }),
        }
    }
}
