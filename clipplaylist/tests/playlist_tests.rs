//! PlaylistManager tests against a scripted clip source

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use clipplaylist::{Error, PlaylistManager, PlaylistSettings, ShuffleStrategy};
use cliptwitch::{
    Clip, ClipSource, FetchResult, FetchSettings, PaginationCursor, Result as SourceResult,
    TimeFilter,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

fn clip(channel: &str, id: usize, views: u64, age_days: i64) -> Clip {
    Clip {
        id: format!("{}-{}", channel, id),
        slug: Some(format!("{}Slug{}", channel, id)),
        title: format!("Clip {}", id),
        created_at: Utc::now() - TimeDelta::days(age_days),
        view_count: views,
        duration_seconds: 25.0,
        thumbnail_url: None,
        url: format!("https://www.twitch.tv/{}/clip/{}Slug{}", channel, channel, id),
        curator: None,
        game: None,
        broadcaster: None,
    }
}

fn page(channel: &str, ids: std::ops::Range<usize>, cursor: Option<&str>) -> FetchResult {
    FetchResult {
        clips: ids.map(|i| clip(channel, i, i as u64, 1)).collect(),
        has_next_page: cursor.is_some(),
        end_cursor: cursor.map(PaginationCursor::new),
    }
}

type Key = (String, TimeFilter, Option<String>);

#[derive(Default)]
struct ScriptedSource {
    pages: HashMap<Key, FetchResult>,
    /// Background pages are held until the gate opens
    gate: Option<Arc<tokio::sync::Notify>>,
    unplayable: HashSet<String>,
    /// Pages requested with one of these cursors fail
    failing_cursors: HashSet<String>,
}

impl ScriptedSource {
    fn page(mut self, channel: &str, filter: TimeFilter, cursor: Option<&str>, result: FetchResult) -> Self {
        self.pages
            .insert((channel.to_string(), filter, cursor.map(String::from)), result);
        self
    }
}

#[async_trait]
impl ClipSource for ScriptedSource {
    async fn fetch_page(
        &self,
        channel: &str,
        _page_size: u32,
        filter: TimeFilter,
        cursor: Option<&PaginationCursor>,
    ) -> SourceResult<FetchResult> {
        if cursor.is_some() {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
        }
        if let Some(cursor) = cursor {
            if self.failing_cursors.contains(cursor.as_str()) {
                return Err(cliptwitch::Error::Status {
                    code: 500,
                    message: "internal error".into(),
                });
            }
        }
        let key = (
            channel.to_string(),
            filter,
            cursor.map(|c| c.as_str().to_string()),
        );
        Ok(self.pages.get(&key).cloned().unwrap_or_default())
    }

    async fn resolve_playback_url(&self, slug: &str) -> SourceResult<Option<String>> {
        if self.unplayable.contains(slug) {
            return Err(cliptwitch::Error::Status {
                code: 502,
                message: "bad gateway".into(),
            });
        }
        Ok(Some(format!("https://cdn.example/{}.mp4?sig=s&token=t", slug)))
    }
}

fn manager(source: Arc<ScriptedSource>) -> PlaylistManager {
    PlaylistManager::with_settings(
        source,
        PlaylistSettings {
            background_target: 400,
            fetch: FetchSettings {
                pacing_delay: Duration::ZERO,
                ..FetchSettings::default()
            },
            seed: Some(1234),
        },
    )
}

#[tokio::test]
async fn test_load_initial_then_background_growth() {
    let source = Arc::new(
        ScriptedSource::default()
            .page("alpha", TimeFilter::AllTime, None, page("alpha", 0..30, Some("alpha-2")))
            .page("alpha", TimeFilter::AllTime, Some("alpha-2"), page("alpha", 30..60, None))
            .page("beta", TimeFilter::AllTime, None, page("beta", 0..25, None)),
    );
    let playlist = manager(source);

    let loaded = playlist
        .load_initial(&["alpha", "beta"], 900, 0, ShuffleStrategy::Smart)
        .await
        .unwrap();
    assert_eq!(loaded, 55);

    playlist.wait_for_background().await;
    assert!(!playlist.is_growing());
    assert_eq!(playlist.len(), 85);

    let ids: HashSet<String> = playlist.clips().into_iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 85);
}

#[tokio::test]
async fn test_filters_apply_to_initial_load() {
    let mut old = page("alpha", 0..25, None);
    for clip in old.clips.iter_mut().take(10) {
        clip.created_at = Utc::now() - TimeDelta::days(60);
    }
    let source = Arc::new(ScriptedSource::default().page("alpha", TimeFilter::LastMonth, None, old));
    let playlist = manager(source);

    // 15 recent clips with views 10..=24; min 20 views keeps 5
    let loaded = playlist
        .load_initial(&["alpha"], 30, 20, ShuffleStrategy::Uniform)
        .await
        .unwrap();
    assert_eq!(loaded, 5);
    assert!(playlist.clips().iter().all(|c| c.view_count >= 20));
}

#[tokio::test]
async fn test_no_clips_is_the_only_hard_error() {
    let source = Arc::new(ScriptedSource::default());
    let playlist = manager(source);

    let err = playlist
        .load_initial(&["ghost"], 7, 0, ShuffleStrategy::Smart)
        .await
        .unwrap_err();
    match err {
        Error::NoClips {
            channels,
            days,
            min_views,
        } => {
            assert_eq!(channels, vec!["ghost"]);
            assert_eq!(days, 7);
            assert_eq!(min_views, 0);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(playlist.is_empty());
    assert!(playlist.next_clip().is_none());
}

#[tokio::test]
async fn test_playback_loops_forever() {
    let source = Arc::new(
        ScriptedSource::default().page("alpha", TimeFilter::AllTime, None, page("alpha", 0..3, None)),
    );
    let playlist = manager(source);
    playlist
        .load_initial(&["alpha"], 900, 0, ShuffleStrategy::Uniform)
        .await
        .unwrap();

    let first: Vec<String> = (0..3).map(|_| playlist.next_clip().unwrap().id).collect();
    assert_eq!(playlist.stats().remaining_clips, 0);
    let second: Vec<String> = (0..3).map(|_| playlist.next_clip().unwrap().id).collect();

    let a: HashSet<&String> = first.iter().collect();
    let b: HashSet<&String> = second.iter().collect();
    assert_eq!(a.len(), 3);
    assert_eq!(a, b);
    assert_eq!(playlist.stats().current_index, 3);
}

#[tokio::test]
async fn test_background_merge_does_not_replay_current_clip() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let mut source = ScriptedSource::default()
        .page("alpha", TimeFilter::LastMonth, None, page("alpha", 0..5, Some("more")))
        .page("alpha", TimeFilter::LastMonth, Some("more"), page("alpha", 5..15, None));
    source.gate = Some(gate.clone());
    let playlist = manager(Arc::new(source));

    playlist
        .load_initial(&["alpha"], 30, 0, ShuffleStrategy::Uniform)
        .await
        .unwrap();
    assert_eq!(playlist.len(), 5);

    for _ in 0..2 {
        playlist.next_clip();
    }
    let played = playlist.next_clip().unwrap();
    assert_eq!(playlist.stats().current_index, 3);

    gate.notify_one();
    playlist.wait_for_background().await;
    assert_eq!(playlist.len(), 15);

    let next = playlist.next_clip().unwrap();
    assert_ne!(next.id, played.id);
}

#[tokio::test]
async fn test_background_failure_keeps_playing() {
    let mut source = ScriptedSource::default()
        .page("alpha", TimeFilter::AllTime, None, page("alpha", 0..30, Some("broken")));
    source.failing_cursors.insert("broken".to_string());
    let playlist = manager(Arc::new(source));

    let loaded = playlist
        .load_initial(&["alpha"], 900, 0, ShuffleStrategy::Uniform)
        .await
        .unwrap();
    assert_eq!(loaded, 30);

    playlist.wait_for_background().await;
    assert!(!playlist.is_growing());
    assert_eq!(playlist.len(), 30);

    // Two full passes, no gap
    let ids: Vec<String> = (0..60).map(|_| playlist.next_clip().unwrap().id).collect();
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 30);
    assert_eq!(playlist.stats().current_index, 30);
}

#[tokio::test]
async fn test_clear_discards_pending_growth() {
    let gate = Arc::new(tokio::sync::Notify::new());
    let mut source = ScriptedSource::default()
        .page("alpha", TimeFilter::AllTime, None, page("alpha", 0..30, Some("more")))
        .page("alpha", TimeFilter::AllTime, Some("more"), page("alpha", 30..60, None));
    source.gate = Some(gate.clone());
    let playlist = manager(Arc::new(source));

    playlist
        .load_initial(&["alpha"], 900, 0, ShuffleStrategy::Smart)
        .await
        .unwrap();
    assert!(playlist.is_growing());

    playlist.clear();
    gate.notify_one();
    playlist.wait_for_background().await;

    assert!(playlist.is_empty());
    assert_eq!(playlist.stats().total_clips, 0);
}

#[tokio::test]
async fn test_set_strategy_reshuffles_from_start() {
    let source = Arc::new(
        ScriptedSource::default().page("alpha", TimeFilter::AllTime, None, page("alpha", 0..40, None)),
    );
    let playlist = manager(source);
    playlist
        .load_initial(&["alpha"], 900, 0, ShuffleStrategy::Uniform)
        .await
        .unwrap();

    let before: HashSet<String> = playlist.clips().into_iter().map(|c| c.id).collect();
    for _ in 0..10 {
        playlist.next_clip();
    }
    playlist.set_strategy(ShuffleStrategy::Stratified);

    assert_eq!(playlist.strategy(), ShuffleStrategy::Stratified);
    assert_eq!(playlist.stats().current_index, 0);
    let after: HashSet<String> = playlist.clips().into_iter().map(|c| c.id).collect();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_playback_url_failures_are_none() {
    let mut source = ScriptedSource::default()
        .page("alpha", TimeFilter::AllTime, None, page("alpha", 0..2, None));
    source.unplayable.insert("alphaSlug1".to_string());
    let playlist = manager(Arc::new(source));

    let ok = clip("alpha", 0, 0, 1);
    assert_eq!(
        playlist.playback_url(&ok).await.as_deref(),
        Some("https://cdn.example/alphaSlug0.mp4?sig=s&token=t")
    );

    let failing = clip("alpha", 1, 0, 1);
    assert!(playlist.playback_url(&failing).await.is_none());

    let mut slugless = clip("alpha", 2, 0, 1);
    slugless.slug = None;
    slugless.url = String::new();
    assert!(playlist.playback_url(&slugless).await.is_none());
}
