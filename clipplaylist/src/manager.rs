//! PlaylistManager: owns the clip sequence and its playback cursor
//!
//! A playlist is filled by a fast initial fetch, then grows in the background
//! from the pagination cursors retained by that fetch. Playback loops forever:
//! when the cursor runs off the end, the whole sequence is reshuffled.

use crate::error::{Error, Result};
use crate::filter::apply_filters;
use crate::shuffle::ShuffleStrategy;
use chrono::Utc;
use cliptwitch::{
    ChannelCursor, Clip, ClipSource, FetchSettings, MultiStrategyFetcher, UniqueClips,
};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Clips targeted by background growth, across all channels
pub const DEFAULT_BACKGROUND_TARGET: usize = 400;

/// Tuning of a [`PlaylistManager`]
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistSettings {
    pub background_target: usize,
    pub fetch: FetchSettings,
    /// Seed of the shuffling RNG; random when `None`
    pub seed: Option<u64>,
}

impl Default for PlaylistSettings {
    fn default() -> Self {
        Self {
            background_target: DEFAULT_BACKGROUND_TARGET,
            fetch: FetchSettings::default(),
            seed: None,
        }
    }
}

/// Snapshot of the playback position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaylistStats {
    pub total_clips: usize,
    pub current_index: usize,
    pub remaining_clips: usize,
}

struct PlaylistState {
    sequence: Vec<Clip>,
    cursor: usize,
    strategy: ShuffleStrategy,
    /// Bumped by every load and clear; background results from an older
    /// generation are dropped
    generation: u64,
    last_played: Option<String>,
    rng: StdRng,
}

impl PlaylistState {
    fn new(seed: Option<u64>) -> Self {
        Self {
            sequence: Vec::new(),
            cursor: 0,
            strategy: ShuffleStrategy::default(),
            generation: 0,
            last_played: None,
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            },
        }
    }

    fn shuffled(&mut self, clips: &[Clip]) -> Vec<Clip> {
        self.strategy.apply(clips, &mut self.rng)
    }

    /// Reshuffle everything and start over, without replaying the last clip
    /// first
    fn restart(&mut self) {
        let current = std::mem::take(&mut self.sequence);
        self.sequence = self.shuffled(&current);
        self.cursor = 0;

        let len = self.sequence.len();
        if len > 1 && self.last_played.as_deref() == Some(self.sequence[0].id.as_str()) {
            let other = self.rng.random_range(1..len);
            self.sequence.swap(0, other);
        }
    }

    fn advance(&mut self) -> Option<Clip> {
        if self.sequence.is_empty() {
            return None;
        }
        if self.cursor >= self.sequence.len() {
            tracing::info!(clips = self.sequence.len(), "End of playlist, reshuffling");
            self.restart();
        }

        let clip = self.sequence[self.cursor].clone();
        self.cursor += 1;
        self.last_played = Some(clip.id.clone());
        Some(clip)
    }

    /// Add unseen clips and reshuffle, keeping the playback position anchored
    /// on the clip just played
    fn merge(&mut self, clips: Vec<Clip>) -> usize {
        let mut fresh = UniqueClips::excluding(self.sequence.iter().map(|c| c.id.clone()));
        let added = fresh.extend(clips);
        if added == 0 {
            return 0;
        }

        let anchor = self
            .cursor
            .checked_sub(1)
            .and_then(|index| self.sequence.get(index))
            .map(|clip| clip.id.clone());

        let mut combined = std::mem::take(&mut self.sequence);
        combined.extend(fresh.into_vec());
        self.sequence = self.shuffled(&combined);

        let relocated = anchor.and_then(|id| self.sequence.iter().position(|c| c.id == id));
        self.cursor = match relocated {
            Some(position) => position + 1,
            None => self.cursor.min(self.sequence.len()),
        };
        added
    }

    fn stats(&self) -> PlaylistStats {
        PlaylistStats {
            total_clips: self.sequence.len(),
            current_index: self.cursor,
            remaining_clips: self.sequence.len().saturating_sub(self.cursor),
        }
    }
}

/// What a background growth task needs to know about the load that spawned it
struct GrowthRequest {
    generation: u64,
    cursors: Vec<ChannelCursor>,
    days: u64,
    min_views: u64,
}

struct ManagerInner {
    fetcher: MultiStrategyFetcher,
    background_target: usize,
    state: Mutex<PlaylistState>,
    background: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerInner {
    fn state(&self) -> MutexGuard<'_, PlaylistState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn background(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.background.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn grow(self: Arc<Self>, request: GrowthRequest) {
        let per_channel = self.background_target.div_ceil(request.cursors.len());

        tracing::info!(
            channels = request.cursors.len(),
            per_channel,
            "Background playlist growth started"
        );

        let outcomes = join_all(request.cursors.iter().map(|cursor| {
            self.fetcher.paginate(
                &cursor.channel,
                cursor.filter,
                cursor.end_cursor.clone(),
                per_channel,
            )
        }))
        .await;

        let mut fetched = Vec::new();
        for (cursor, outcome) in request.cursors.iter().zip(outcomes) {
            match outcome {
                Ok(pagination) => fetched.extend(pagination.clips),
                Err(e) => tracing::warn!(
                    channel = %cursor.channel,
                    error = %e,
                    "Background fetch failed"
                ),
            }
        }

        let clips = apply_filters(fetched, request.days, request.min_views, Utc::now());

        let mut state = self.state();
        if state.generation != request.generation {
            tracing::debug!("Playlist changed during background growth, dropping results");
            return;
        }
        let added = state.merge(clips);
        tracing::info!(
            added,
            total = state.sequence.len(),
            "Background playlist growth finished"
        );
    }
}

/// Shuffled, looping, self-growing clip playlist
///
/// Cloning gives another handle on the same playlist.
///
/// # Example
///
/// ```no_run
/// use clipplaylist::{PlaylistManager, ShuffleStrategy};
/// use cliptwitch::TwitchClient;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> clipplaylist::Result<()> {
/// let source = Arc::new(TwitchClient::new().await?);
/// let playlist = PlaylistManager::new(source);
///
/// playlist
///     .load_initial(&["somechannel"], 30, 10, ShuffleStrategy::Smart)
///     .await?;
///
/// while let Some(clip) = playlist.next_clip() {
///     match playlist.playback_url(&clip).await {
///         Some(url) => println!("{} -> {}", clip.title, url),
///         None => continue,
///     }
/// #   break;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PlaylistManager {
    inner: Arc<ManagerInner>,
}

impl PlaylistManager {
    pub fn new(source: Arc<dyn ClipSource>) -> Self {
        Self::with_settings(source, PlaylistSettings::default())
    }

    pub fn with_settings(source: Arc<dyn ClipSource>, settings: PlaylistSettings) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                fetcher: MultiStrategyFetcher::with_settings(source, settings.fetch),
                background_target: settings.background_target,
                state: Mutex::new(PlaylistState::new(settings.seed)),
                background: Mutex::new(None),
            }),
        }
    }

    /// Fetch, filter and shuffle the clips of `channels`, replacing the
    /// current playlist
    ///
    /// Returns the number of clips loaded. Background growth is started
    /// before returning and is not awaited. Fails with [`Error::NoClips`] when
    /// nothing survives the filters.
    pub async fn load_initial<S: AsRef<str>>(
        &self,
        channels: &[S],
        days: u64,
        min_views: u64,
        strategy: ShuffleStrategy,
    ) -> Result<usize> {
        let channels: Vec<String> = channels
            .iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        tracing::info!(
            channels = %channels.join(","),
            days,
            min_views,
            strategy = %strategy,
            "Loading playlist"
        );

        let multi = self.inner.fetcher.fetch_diverse_multi(channels.as_slice(), days).await;
        let fetched = multi.clips.len();
        let clips = apply_filters(multi.clips, days, min_views, Utc::now());

        if clips.is_empty() {
            tracing::warn!(fetched, "No clips left after filtering");
            return Err(Error::NoClips {
                channels,
                days,
                min_views,
            });
        }

        let count = clips.len();
        let generation = {
            let mut state = self.inner.state();
            state.generation += 1;
            state.strategy = strategy;
            state.sequence = state.shuffled(&clips);
            state.cursor = 0;
            state.last_played = None;
            state.generation
        };

        tracing::info!(fetched, loaded = count, "Playlist ready");

        self.spawn_growth(GrowthRequest {
            generation,
            cursors: multi.cursors,
            days,
            min_views,
        });

        Ok(count)
    }

    fn spawn_growth(&self, mut request: GrowthRequest) {
        request.cursors.retain(|cursor| cursor.resume_from().is_some());
        if request.cursors.is_empty() || self.inner.background_target == 0 {
            tracing::debug!("No further pages to fetch in the background");
            return;
        }

        let inner = self.inner.clone();
        let handle = tokio::spawn(inner.grow(request));
        *self.inner.background() = Some(handle);
    }

    /// Next clip to play, looping forever over a non-empty playlist
    pub fn next_clip(&self) -> Option<Clip> {
        self.inner.state().advance()
    }

    /// Signed playable URL of `clip`, `None` when it cannot be played
    pub async fn playback_url(&self, clip: &Clip) -> Option<String> {
        let Some(slug) = clip.playback_slug() else {
            tracing::warn!(clip = %clip.id, "Clip has no slug");
            return None;
        };

        match self.inner.fetcher.source().resolve_playback_url(slug).await {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(clip = %clip.id, slug = %slug, error = %e, "Playback URL lookup failed");
                None
            }
        }
    }

    /// Switch strategy and reshuffle from the start
    pub fn set_strategy(&self, strategy: ShuffleStrategy) {
        let mut state = self.inner.state();
        state.strategy = strategy;
        state.restart();
        tracing::info!(strategy = %strategy, "Shuffle strategy changed");
    }

    pub fn strategy(&self) -> ShuffleStrategy {
        self.inner.state().strategy
    }

    pub fn stats(&self) -> PlaylistStats {
        self.inner.state().stats()
    }

    pub fn len(&self) -> usize {
        self.inner.state().sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state().sequence.is_empty()
    }

    /// Copy of the current order
    pub fn clips(&self) -> Vec<Clip> {
        self.inner.state().sequence.clone()
    }

    /// Empty the playlist; pending background results are discarded
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.generation += 1;
        state.sequence.clear();
        state.cursor = 0;
        state.last_played = None;
    }

    /// Whether background growth is still running
    pub fn is_growing(&self) -> bool {
        self.inner
            .background()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the pending background growth, if any
    pub async fn wait_for_background(&self) {
        let handle = self.inner.background().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background growth task failed");
            }
        }
    }
}
