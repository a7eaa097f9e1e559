//! poe-price-watch — scrape a currency price from cnlgaming.com and hand it to a presence sink.
//!
//! One cycle runs: landing page → CSRF token → EUR currency switch → target page → first `h4`.

pub mod currency;
pub mod error;
pub mod pipeline;
pub mod price;
pub mod scheduler;
pub mod session;
pub mod token;
pub mod types;

pub use currency::{switch_currency, CurrencyChangeResult, TARGET_CURRENCY};
pub use error::{ScrapeError, ScrapeResult};
pub use pipeline::PricePipeline;
pub use price::extract_price;
pub use scheduler::{run_cycle, CycleOutcome, PresenceSink, PricePoller, DEFAULT_POLL_PERIOD};
pub use session::{ScrapeSession, SessionConfig};
pub use token::extract_csrf_token;
pub use types::{Stage, Target};
