//! Session currency switch through the site's AJAX endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ScrapeError, ScrapeResult};
use crate::session::ScrapeSession;
use crate::types::Stage;

/// The only pricing currency this service publishes.
pub const TARGET_CURRENCY: &str = "EUR";

pub const CHANGE_CURRENCY_PATH: &str = "/ajax/change-currency";

/// Acknowledgment body of the change-currency endpoint.
///
/// Both fields are optional on the wire; a missing field never confirms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyChangeResult {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl CurrencyChangeResult {
    /// `error` is numeric zero.
    pub fn is_ok(&self) -> bool {
        self.error
            .as_ref()
            .and_then(Value::as_f64)
            .is_some_and(|code| code == 0.0)
    }

    /// True iff the switch succeeded and the site echoed `expected`.
    pub fn confirms(&self, expected: &str) -> bool {
        self.is_ok() && self.currency.as_deref() == Some(expected)
    }
}

/// Ask the remote session to price everything in `currency`.
///
/// The CSRF header must already be set on `session`. Returns the decoded
/// acknowledgment only when it confirms the requested currency.
pub async fn switch_currency(
    session: &ScrapeSession,
    currency: &str,
) -> ScrapeResult<CurrencyChangeResult> {
    let url = session.endpoint(CHANGE_CURRENCY_PATH)?;
    let body = session
        .post_form(url.as_str(), &[("currency", currency)], Stage::SwitchCurrency)
        .await?;

    let result: CurrencyChangeResult =
        serde_json::from_str(&body).map_err(|e| ScrapeError::Parse {
            stage: Stage::SwitchCurrency,
            detail: format!("change-currency response is not a JSON object: {e}"),
        })?;

    if !result.confirms(currency) {
        return Err(ScrapeError::CurrencySwitchRejected {
            error: result.error,
            currency: result.currency,
        });
    }

    tracing::debug!("Remote session currency confirmed as {currency}");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> CurrencyChangeResult {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_confirms_success() {
        let r = parse(json!({"error": 0, "currency": "EUR"}));
        assert!(r.is_ok());
        assert!(r.confirms("EUR"));
    }

    #[test]
    fn test_error_field_nonzero() {
        let r = parse(json!({"error": 1, "currency": "EUR"}));
        assert!(!r.confirms("EUR"));
    }

    #[test]
    fn test_currency_mismatch() {
        let r = parse(json!({"error": 0, "currency": "USD"}));
        assert!(r.is_ok());
        assert!(!r.confirms("EUR"));
    }

    #[test]
    fn test_missing_fields() {
        assert!(!parse(json!({"currency": "EUR"})).confirms("EUR"));
        assert!(!parse(json!({"error": 0})).confirms("EUR"));
        assert!(!parse(json!({})).confirms("EUR"));
    }

    #[test]
    fn test_error_field_types() {
        // A float zero is still zero; strings and booleans are not.
        assert!(parse(json!({"error": 0.0, "currency": "EUR"})).confirms("EUR"));
        assert!(!parse(json!({"error": "0", "currency": "EUR"})).confirms("EUR"));
        assert!(!parse(json!({"error": false, "currency": "EUR"})).confirms("EUR"));
        assert!(!parse(json!({"error": null, "currency": "EUR"})).confirms("EUR"));
    }

    #[test]
    fn test_currency_case_sensitive() {
        assert!(!parse(json!({"error": 0, "currency": "eur"})).confirms("EUR"));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let r = parse(json!({"error": 0, "currency": "EUR", "symbol": "€", "rate": 0.92}));
        assert!(r.confirms(TARGET_CURRENCY));
    }
}
