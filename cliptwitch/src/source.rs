//! The clip source abstraction
//!
//! Everything above the HTTP layer talks to a [`ClipSource`], so the fetcher and
//! the playlist can be driven by any implementation, including scripted ones.

use crate::client::TwitchClient;
use crate::error::Result;
use crate::models::{FetchResult, PaginationCursor, TimeFilter};
use async_trait::async_trait;

/// A paginated provider of clips and their playback URLs
#[async_trait]
pub trait ClipSource: Send + Sync {
    /// Fetch at most `page_size` clips of `channel` for `filter`, continuing
    /// from `cursor` if given
    async fn fetch_page(
        &self,
        channel: &str,
        page_size: u32,
        filter: TimeFilter,
        cursor: Option<&PaginationCursor>,
    ) -> Result<FetchResult>;

    /// Signed playable URL for a clip slug, `None` when the clip is unplayable
    async fn resolve_playback_url(&self, slug: &str) -> Result<Option<String>>;
}

#[async_trait]
impl ClipSource for TwitchClient {
    async fn fetch_page(
        &self,
        channel: &str,
        page_size: u32,
        filter: TimeFilter,
        cursor: Option<&PaginationCursor>,
    ) -> Result<FetchResult> {
        TwitchClient::fetch_page(self, channel, page_size, filter, cursor).await
    }

    async fn resolve_playback_url(&self, slug: &str) -> Result<Option<String>> {
        TwitchClient::resolve_playback_url(self, slug).await
    }
}
