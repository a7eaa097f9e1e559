//! The shared HTTP session used for every request to the remote site.
//!
//! Wraps one `reqwest::Client` with a cookie store, a browser user agent and
//! the AJAX marker header. The CSRF token header is kept outside the client
//! because reqwest default headers are fixed at build time; it is applied to
//! each request once set.
//!
//! The session is shared by `Arc` between every poller. A token written by
//! one cycle is read by whichever request runs next, from any target. That is
//! fine while all cycles use the same cookie jar and request the same
//! currency.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{ScrapeError, ScrapeResult};
use crate::types::Stage;

pub const DEFAULT_BASE_URL: &str = "https://cnlgaming.com";

/// Per-request timeout. Well inside the poll period so a hung request never
/// spills into the next tick.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/91.0.4472.124 Safari/537.36";

const CSRF_HEADER: &str = "x-csrf-token";
const REQUESTED_WITH_HEADER: &str = "x-requested-with";

/// Settings for building a [`ScrapeSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Site root; the landing page and the AJAX endpoint hang off it.
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Long-lived HTTP session against the remote site.
pub struct ScrapeSession {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    csrf_token: RwLock<Option<HeaderValue>>,
}

impl ScrapeSession {
    /// Build the session. Fails only on a bad base URL or TLS backend setup.
    pub fn new(config: SessionConfig) -> ScrapeResult<Self> {
        let base_url = Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static(REQUESTED_WITH_HEADER),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(config.user_agent)
            .default_headers(headers)
            .cookie_store(true)
            .build()
            .map_err(ScrapeError::Client)?;

        tracing::debug!(
            "Scrape session opened for {} (timeout {}s)",
            base_url,
            config.timeout.as_secs()
        );

        Ok(Self {
            client,
            base_url,
            timeout: config.timeout,
            csrf_token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve a path against the base URL.
    pub fn endpoint(&self, path: &str) -> ScrapeResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Set the CSRF header sent with this and every later request.
    pub fn set_csrf_token(&self, token: &str) -> ScrapeResult<()> {
        let value = HeaderValue::from_str(token).map_err(|e| ScrapeError::Parse {
            stage: Stage::ExtractToken,
            detail: format!("token is not a valid header value: {e}"),
        })?;
        let mut guard = self.csrf_token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(value);
        Ok(())
    }

    /// The CSRF token currently attached to requests.
    pub fn csrf_token(&self) -> Option<String> {
        let guard = self.csrf_token.read().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// GET a page and return its body. Non-2xx is a network error.
    pub async fn get_text(&self, url: &str, stage: Stage) -> ScrapeResult<String> {
        let request = self.with_token(self.client.get(url));
        let resp = request
            .send()
            .await
            .map_err(|e| ScrapeError::network(stage, e))?;
        Self::read_body(resp, stage).await
    }

    /// POST url-encoded form fields and return the body. Non-2xx is a network error.
    pub async fn post_form(
        &self,
        url: &str,
        form_fields: &[(&str, &str)],
        stage: Stage,
    ) -> ScrapeResult<String> {
        let request = self.with_token(self.client.post(url)).form(form_fields);
        let resp = request
            .send()
            .await
            .map_err(|e| ScrapeError::network(stage, e))?;
        Self::read_body(resp, stage).await
    }

    /// Release this handle at shutdown.
    ///
    /// Only one `Arc` is dropped here. The client and its connection pool are
    /// freed when the last holder goes, so stop every poller first.
    pub fn close(self: Arc<Self>) {
        let others = Arc::strong_count(&self) - 1;
        if others > 0 {
            tracing::warn!("Closing scrape session with {others} other holder(s) still alive");
        } else {
            tracing::info!("Scrape session closed");
        }
    }

    fn with_token(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let guard = self.csrf_token.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(token) => builder.header(CSRF_HEADER, token.clone()),
            None => builder,
        }
    }

    async fn read_body(resp: reqwest::Response, stage: Stage) -> ScrapeResult<String> {
        let resp = resp
            .error_for_status()
            .map_err(|e| ScrapeError::network(stage, e))?;
        resp.text().await.map_err(|e| ScrapeError::network(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_creation() {
        let session = ScrapeSession::new(SessionConfig::default()).unwrap();
        assert_eq!(session.base_url().as_str(), "https://cnlgaming.com/");
        assert_eq!(session.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(session.csrf_token().is_none());
    }

    #[test]
    fn test_bad_base_url() {
        let cfg = SessionConfig {
            base_url: "::not-a-url".to_string(),
            ..SessionConfig::default()
        };
        assert!(matches!(
            ScrapeSession::new(cfg),
            Err(ScrapeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_endpoint_join() {
        let session = ScrapeSession::new(SessionConfig::default()).unwrap();
        let url = session.endpoint("/ajax/change-currency").unwrap();
        assert_eq!(url.as_str(), "https://cnlgaming.com/ajax/change-currency");
    }

    #[test]
    fn test_token_roundtrip_and_overwrite() {
        let session = ScrapeSession::new(SessionConfig::default()).unwrap();
        session.set_csrf_token("first").unwrap();
        session.set_csrf_token("second").unwrap();
        assert_eq!(session.csrf_token().as_deref(), Some("second"));
    }

    #[test]
    fn test_close_frees_client_with_last_holder() {
        let session = Arc::new(ScrapeSession::new(SessionConfig::default()).unwrap());
        let poller_copy = Arc::clone(&session);
        let weak = Arc::downgrade(&session);

        session.close();
        assert!(weak.upgrade().is_some());

        drop(poller_copy);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_token_with_newline_rejected() {
        let session = ScrapeSession::new(SessionConfig::default()).unwrap();
        let err = session.set_csrf_token("bad\ntoken").unwrap_err();
        assert!(matches!(err, ScrapeError::Parse { stage: Stage::ExtractToken, .. }));
        assert!(session.csrf_token().is_none());
    }
}
