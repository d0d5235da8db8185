//! # clipplaylist - shuffled, self-growing clip playlists
//!
//! This crate turns the clips fetched by `cliptwitch` into an endless
//! playlist:
//! - Initial load across several channels and time filters
//! - Date range and minimum view filters
//! - Uniform, stratified, weighted and smart shuffling
//! - Background growth from the retained pagination cursors, merged without
//!   losing the playback position
//! - Infinite looping with a reshuffle at every wraparound
//!
//! # Example
//!
//! ```no_run
//! use clipplaylist::{PlaylistManager, ShuffleStrategy};
//! use cliptwitch::TwitchClient;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let playlist = PlaylistManager::new(Arc::new(TwitchClient::new().await?));
//! let loaded = playlist
//!     .load_initial(&["alpha", "beta"], 900, 0, ShuffleStrategy::Smart)
//!     .await?;
//! println!("{} clips ready", loaded);
//!
//! if let Some(clip) = playlist.next_clip() {
//!     println!("{:?}", playlist.playback_url(&clip).await);
//! }
//! # Ok::<(), clipplaylist::Error>(())
//! # }).unwrap();
//! ```

mod error;
pub mod filter;
mod manager;
pub mod shuffle;

#[cfg(feature = "clipconfig")]
mod config_ext;

// Public re-exports
pub use error::{Error, Result};
pub use filter::{apply_filters, filter_by_date_range, filter_by_min_views};
pub use manager::{PlaylistManager, PlaylistSettings, PlaylistStats, DEFAULT_BACKGROUND_TARGET};
pub use shuffle::{
    smart_shuffle, stratified_shuffle, uniform_shuffle, weighted_shuffle, ShuffleStrategy,
};

#[cfg(feature = "clipconfig")]
pub use config_ext::PlaylistConfigExt;
