//! Playlist settings read from clipconfig

use crate::manager::{PlaylistManager, PlaylistSettings, DEFAULT_BACKGROUND_TARGET};
use anyhow::Result;
use clipconfig::Config;
use cliptwitch::{TwitchClient, TwitchConfigExt};
use serde_yaml::{Number, Value};
use std::sync::Arc;

/// Extension trait exposing the `playlist` section
pub trait PlaylistConfigExt {
    /// Clips fetched in the background after the initial load (default: 400)
    fn get_playlist_background_target(&self) -> Result<usize>;

    fn set_playlist_background_target(&self, target: usize) -> Result<()>;

    /// Playlist and fetcher settings together
    fn get_playlist_settings(&self) -> Result<PlaylistSettings>;
}

impl PlaylistConfigExt for Config {
    fn get_playlist_background_target(&self) -> Result<usize> {
        Ok(self
            .get_u64(&["playlist", "background_target"])?
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_BACKGROUND_TARGET))
    }

    fn set_playlist_background_target(&self, target: usize) -> Result<()> {
        self.set_value(
            &["playlist", "background_target"],
            Value::Number(Number::from(target as u64)),
        )
    }

    fn get_playlist_settings(&self) -> Result<PlaylistSettings> {
        Ok(PlaylistSettings {
            background_target: self.get_playlist_background_target()?,
            fetch: self.get_fetch_settings()?,
            seed: None,
        })
    }
}

impl PlaylistManager {
    /// Playlist backed by a Twitch client, both configured from `config`
    pub async fn from_config(config: &Config) -> crate::Result<Self> {
        let client = TwitchClient::from_config(config).await?;
        let settings = config.get_playlist_settings()?;
        Ok(Self::with_settings(Arc::new(client), settings))
    }
}
