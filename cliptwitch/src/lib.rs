//! Twitch clips client library for ClipReel
//!
//! This crate talks to Twitch's public GraphQL endpoint to list the clips of a
//! channel and to resolve the signed video URL of a single clip.
//!
//! # Features
//!
//! - **Clip listing**: paginated `ClipsCards__User` query per time filter
//!   (last day, last week, last month, all time)
//! - **Playback URLs**: signed, directly playable clip URLs
//! - **Multi-strategy fetching**: several filters queried concurrently and
//!   merged, with an all-time fallback for thin channels
//! - **Deep pagination**: cursor walking with pacing and a loop guard
//! - **Configuration Extension**: endpoint, client id and fetcher knobs read
//!   from clipconfig
//!
//! # Example
//!
//! ```no_run
//! use cliptwitch::{MultiStrategyFetcher, TwitchClient};
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let client = Arc::new(TwitchClient::new().await?);
//! let fetcher = MultiStrategyFetcher::new(client.clone());
//!
//! let fetch = fetcher.fetch_diverse("somechannel", 30).await;
//! println!("{} clips (primary filter {})", fetch.result.clips.len(), fetch.primary_filter);
//!
//! if let Some(slug) = fetch.result.clips.first().and_then(|c| c.playback_slug()) {
//!     println!("{:?}", client.resolve_playback_url(slug).await?);
//! }
//! # Ok::<(), cliptwitch::Error>(())
//! # }).unwrap();
//! ```

pub mod client;
pub mod error;
pub mod fetcher;
pub mod graphql;
pub mod models;
pub mod source;

#[cfg(feature = "clipconfig")]
pub mod config_ext;

// Re-exports
pub use client::{ClientBuilder, QueryMode, TwitchClient};
pub use error::{Error, Result};
pub use fetcher::{
    ChannelCursor, DiverseFetch, FetchSettings, MultiChannelFetch, MultiStrategyFetcher,
    Pagination,
};
pub use models::{
    Broadcaster, Clip, Curator, FetchResult, Game, PaginationCursor, TimeFilter, UniqueClips,
};
pub use source::ClipSource;

#[cfg(feature = "clipconfig")]
pub use config_ext::TwitchConfigExt;
