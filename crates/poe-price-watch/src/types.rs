//! Core data types shared by the pipeline and the poller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One monitored page: a display label and the listing URL to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub label: String,
    pub url: String,
}

impl Target {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.url)
    }
}

/// Stages of one fetch cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchLanding,
    ExtractToken,
    SwitchCurrency,
    FetchTarget,
    ExtractPrice,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::FetchLanding => "fetch_landing",
            Stage::ExtractToken => "extract_token",
            Stage::SwitchCurrency => "switch_currency",
            Stage::FetchTarget => "fetch_target",
            Stage::ExtractPrice => "extract_price",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
