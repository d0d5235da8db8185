//! Headless playback driving a [`PlaylistManager`]

use async_trait::async_trait;
use clipplaylist::PlaylistManager;
use cliptwitch::Clip;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Wait before moving past a clip whose URL could not be resolved
pub const UNPLAYABLE_SKIP_DELAY: Duration = Duration::from_secs(1);

/// Wait before moving past a clip that failed to play
pub const PLAYBACK_ERROR_SKIP_DELAY: Duration = Duration::from_secs(2);

/// How often the session logs playlist statistics, in clips
pub const STATS_EVERY: usize = 10;

/// Something that can play clip URLs
#[async_trait]
pub trait ClipPlayer: Send {
    /// Play `url` until the clip ends
    async fn play_clip(&mut self, clip: &Clip, url: &str) -> anyhow::Result<()>;

    /// Warm up the next URL while the current clip plays
    fn preload_clip(&mut self, url: &str);
}

/// Player that only logs what it would show
///
/// Each clip "plays" for its duration, capped at `max_clip_time`.
pub struct LogPlayer {
    max_clip_time: Duration,
    preloaded: Option<String>,
}

impl LogPlayer {
    pub fn new(max_clip_time: Duration) -> Self {
        Self {
            max_clip_time,
            preloaded: None,
        }
    }
}

#[async_trait]
impl ClipPlayer for LogPlayer {
    async fn play_clip(&mut self, clip: &Clip, url: &str) -> anyhow::Result<()> {
        let parsed = Url::parse(url)?;
        let warm = self.preloaded.take().as_deref() == Some(url);
        info!(
            id = %clip.id,
            title = %clip.title,
            channel = clip.broadcaster_name().unwrap_or("?"),
            views = clip.view_count,
            host = parsed.host_str().unwrap_or(""),
            preloaded = warm,
            "▶️ Playing clip"
        );

        let duration = if clip.duration_seconds > 0.0 {
            Duration::try_from_secs_f64(clip.duration_seconds).unwrap_or(self.max_clip_time)
        } else {
            Duration::ZERO
        };
        tokio::time::sleep(duration.min(self.max_clip_time)).await;
        Ok(())
    }

    fn preload_clip(&mut self, url: &str) {
        debug!(url, "Preloading next clip");
        self.preloaded = Some(url.to_string());
    }
}

/// Counters for one playback session
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub played: usize,
    pub unplayable: usize,
    pub failed: usize,
}

impl SessionReport {
    pub fn attempted(&self) -> usize {
        self.played + self.unplayable + self.failed
    }
}

/// Walks the playlist, resolving and playing one clip after another
///
/// The clip after the current one is taken from the playlist as soon as the
/// current one starts, so its URL resolves during playback.
pub struct Session<P> {
    playlist: PlaylistManager,
    player: P,
    unplayable_delay: Duration,
    error_delay: Duration,
}

impl<P: ClipPlayer> Session<P> {
    pub fn new(playlist: PlaylistManager, player: P) -> Self {
        Self {
            playlist,
            player,
            unplayable_delay: UNPLAYABLE_SKIP_DELAY,
            error_delay: PLAYBACK_ERROR_SKIP_DELAY,
        }
    }

    /// Override the skip delays
    pub fn with_delays(mut self, unplayable: Duration, error: Duration) -> Self {
        self.unplayable_delay = unplayable;
        self.error_delay = error;
        self
    }

    pub fn player(&self) -> &P {
        &self.player
    }

    /// Play until `limit` clips were attempted, or forever with `None`
    pub async fn run(&mut self, limit: Option<usize>) -> SessionReport {
        let mut report = SessionReport::default();
        let mut upcoming: Option<(Clip, Option<String>)> = None;

        while limit.is_none_or(|max| report.attempted() < max) {
            let (clip, url) = match upcoming.take() {
                Some(ready) => ready,
                None => {
                    let Some(clip) = self.playlist.next_clip() else {
                        warn!("Playlist is empty, stopping");
                        break;
                    };
                    let url = self.playlist.playback_url(&clip).await;
                    (clip, url)
                }
            };

            let Some(url) = url else {
                warn!(id = %clip.id, "No playable URL, skipping");
                report.unplayable += 1;
                tokio::time::sleep(self.unplayable_delay).await;
                continue;
            };

            let wants_next = limit.is_none_or(|max| report.attempted() + 1 < max);
            let next = if wants_next { self.playlist.next_clip() } else { None };

            let playlist = &self.playlist;
            let (played, next_url) = tokio::join!(self.player.play_clip(&clip, &url), async {
                match &next {
                    Some(next) => playlist.playback_url(next).await,
                    None => None,
                }
            });

            match played {
                Ok(()) => report.played += 1,
                Err(e) => {
                    warn!(id = %clip.id, "Playback failed: {}", e);
                    report.failed += 1;
                    tokio::time::sleep(self.error_delay).await;
                }
            }

            if let Some(next) = next {
                if let Some(url) = &next_url {
                    self.player.preload_clip(url);
                }
                upcoming = Some((next, next_url));
            }

            if report.attempted() % STATS_EVERY == 0 {
                let stats = self.playlist.stats();
                info!(
                    total = stats.total_clips,
                    index = stats.current_index,
                    remaining = stats.remaining_clips,
                    growing = self.playlist.is_growing(),
                    "Playlist status"
                );
            }
        }

        report
    }
}
