//! Twitch client settings read from clipconfig
//!
//! ```rust,ignore
//! use clipconfig::get_config;
//! use cliptwitch::{TwitchClient, TwitchConfigExt};
//!
//! let config = get_config()?;
//! let client = TwitchClient::from_config(&config).await?;
//! let settings = config.get_fetch_settings()?;
//! ```

use crate::client::{
    ClientBuilder, QueryMode, TwitchClient, DEFAULT_CLIENT_ID, DEFAULT_ENDPOINT,
    DEFAULT_REQUEST_TIMEOUT_SECS, MAX_PAGE_SIZE,
};
use crate::fetcher::{
    FetchSettings, DEFAULT_FALLBACK_PAGES, DEFAULT_LOW_YIELD_FLOOR, DEFAULT_PAGE_SIZE,
};
use anyhow::{anyhow, Result};
use clipconfig::Config;
use std::time::Duration;

const DEFAULT_PACING_DELAY_MS: u64 = 100;

/// Extension trait exposing the `twitch` and `fetcher` sections
pub trait TwitchConfigExt {
    /// GraphQL endpoint (default: `https://gql.twitch.tv/gql`)
    fn get_twitch_endpoint(&self) -> Result<String>;

    fn get_twitch_client_id(&self) -> Result<String>;

    /// Request timeout (default: 30 s)
    fn get_twitch_timeout(&self) -> Result<Duration>;

    /// `persisted` or `literal`
    fn get_twitch_query_mode(&self) -> Result<QueryMode>;

    /// Clips per page, at most 100
    fn get_twitch_page_size(&self) -> Result<u32>;

    fn get_twitch_pacing_delay(&self) -> Result<Duration>;

    /// Below this many clips the all-time fallback is used (default: 20)
    fn get_fetcher_low_yield_floor(&self) -> Result<usize>;

    fn get_fetcher_fallback_pages(&self) -> Result<usize>;

    /// All fetcher knobs at once
    fn get_fetch_settings(&self) -> Result<FetchSettings> {
        Ok(FetchSettings {
            page_size: self.get_twitch_page_size()?,
            low_yield_floor: self.get_fetcher_low_yield_floor()?,
            fallback_pages: self.get_fetcher_fallback_pages()?,
            pacing_delay: self.get_twitch_pacing_delay()?,
        })
    }
}

impl TwitchConfigExt for Config {
    fn get_twitch_endpoint(&self) -> Result<String> {
        Ok(self
            .get_string(&["twitch", "endpoint"])?
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()))
    }

    fn get_twitch_client_id(&self) -> Result<String> {
        Ok(self
            .get_string(&["twitch", "client_id"])?
            .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()))
    }

    fn get_twitch_timeout(&self) -> Result<Duration> {
        let secs = self
            .get_u64(&["twitch", "request_timeout_secs"])?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        Ok(Duration::from_secs(secs))
    }

    fn get_twitch_query_mode(&self) -> Result<QueryMode> {
        match self.get_string(&["twitch", "query_mode"])?.as_deref() {
            None => Ok(QueryMode::default()),
            Some(mode) => match mode.trim().to_ascii_lowercase().as_str() {
                "persisted" => Ok(QueryMode::Persisted),
                "literal" => Ok(QueryMode::Literal),
                other => Err(anyhow!("twitch.query_mode: unknown mode {:?}", other)),
            },
        }
    }

    fn get_twitch_page_size(&self) -> Result<u32> {
        let size = self
            .get_u64(&["twitch", "page_size"])?
            .unwrap_or(DEFAULT_PAGE_SIZE as u64);
        Ok(size.clamp(1, MAX_PAGE_SIZE as u64) as u32)
    }

    fn get_twitch_pacing_delay(&self) -> Result<Duration> {
        let ms = self
            .get_u64(&["twitch", "pacing_delay_ms"])?
            .unwrap_or(DEFAULT_PACING_DELAY_MS);
        Ok(Duration::from_millis(ms))
    }

    fn get_fetcher_low_yield_floor(&self) -> Result<usize> {
        Ok(self
            .get_u64(&["fetcher", "low_yield_floor"])?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_LOW_YIELD_FLOOR))
    }

    fn get_fetcher_fallback_pages(&self) -> Result<usize> {
        Ok(self
            .get_u64(&["fetcher", "fallback_pages"])?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_FALLBACK_PAGES))
    }
}

impl TwitchClient {
    /// Build a client from the `twitch` configuration section
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        ClientBuilder::new()
            .endpoint(config.get_twitch_endpoint()?)
            .client_id(config.get_twitch_client_id()?)
            .timeout(config.get_twitch_timeout()?)
            .query_mode(config.get_twitch_query_mode()?)
            .build()
            .await
    }
}
