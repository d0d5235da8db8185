//! Data models for clips and paginated fetch results
//!
//! These are the canonical records handed to the rest of the player. The raw
//! GraphQL shapes live in [`crate::graphql`] and are normalized into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Clip
// ============================================================================

/// A short highlight cut from a live stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Opaque unique identifier, stable across fetches
    pub id: String,
    /// Short identifier used to request a signed playback URL
    pub slug: Option<String>,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub view_count: u64,
    pub duration_seconds: f64,
    #[serde(rename = "thumbnailURL")]
    pub thumbnail_url: Option<String>,
    /// Canonical watch page URL
    pub url: String,
    pub curator: Option<Curator>,
    pub game: Option<Game>,
    pub broadcaster: Option<Broadcaster>,
}

impl Clip {
    /// Slug to use for playback resolution
    ///
    /// Falls back to the trailing path segment of the watch URL when the API
    /// did not provide a slug.
    pub fn playback_slug(&self) -> Option<&str> {
        self.slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| Self::slug_from_url(&self.url))
    }

    /// Extract the trailing path segment of a clip URL
    ///
    /// # Example
    ///
    /// ```
    /// use cliptwitch::Clip;
    ///
    /// assert_eq!(
    ///     Clip::slug_from_url("https://www.twitch.tv/foo/clip/FunnyCatClip-abc?t=1"),
    ///     Some("FunnyCatClip-abc")
    /// );
    /// assert_eq!(Clip::slug_from_url(""), None);
    /// assert_eq!(Clip::slug_from_url("https://www.twitch.tv/"), None);
    /// ```
    pub fn slug_from_url(url: &str) -> Option<&str> {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        // Only the path counts, never the host
        let path = match path.split_once("://") {
            Some((_, rest)) => rest.split_once('/').map_or("", |(_, path)| path),
            None => path,
        };
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .next_back()
            .filter(|segment| !segment.contains(':'))
    }

    /// Display name of whoever broadcast the clip, if known
    pub fn broadcaster_name(&self) -> Option<&str> {
        self.broadcaster.as_ref().map(|b| b.display_name.as_str())
    }
}

/// The user who cut the clip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curator {
    pub display_name: String,
    pub login: String,
}

/// The game being played when the clip was cut
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Option<String>,
    pub name: String,
}

/// The channel the clip belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcaster {
    pub display_name: String,
    pub login: String,
}

// ============================================================================
// Time filter
// ============================================================================

/// Coarse recency bucket accepted by the clips API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeFilter {
    LastDay,
    LastWeek,
    LastMonth,
    AllTime,
}

impl TimeFilter {
    /// Pick the narrowest filter that still covers `days`
    pub fn from_days(days: u64) -> Self {
        match days {
            0..=1 => TimeFilter::LastDay,
            2..=7 => TimeFilter::LastWeek,
            8..=30 => TimeFilter::LastMonth,
            _ => TimeFilter::AllTime,
        }
    }

    /// Wire name (e.g. `LAST_WEEK`)
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::LastDay => "LAST_DAY",
            TimeFilter::LastWeek => "LAST_WEEK",
            TimeFilter::LastMonth => "LAST_MONTH",
            TimeFilter::AllTime => "ALL_TIME",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LAST_DAY" => Ok(TimeFilter::LastDay),
            "LAST_WEEK" => Ok(TimeFilter::LastWeek),
            "LAST_MONTH" => Ok(TimeFilter::LastMonth),
            "ALL_TIME" => Ok(TimeFilter::AllTime),
            other => Err(crate::Error::other(format!("Unknown time filter: {}", other))),
        }
    }
}

// ============================================================================
// Pagination
// ============================================================================

/// Opaque pagination token issued by the API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaginationCursor(String);

impl PaginationCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines
    pub fn preview(&self) -> &str {
        match self.0.char_indices().nth(12) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Display for PaginationCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PaginationCursor {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One page of clips, whatever shape the API answered with
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchResult {
    pub clips: Vec<Clip>,
    pub has_next_page: bool,
    pub end_cursor: Option<PaginationCursor>,
}

impl FetchResult {
    /// A result with no clips and nothing further to fetch
    pub fn empty() -> Self {
        Self::default()
    }

    /// The cursor to continue from, if another page is available
    pub fn next_cursor(&self) -> Option<&PaginationCursor> {
        if self.has_next_page {
            self.end_cursor.as_ref()
        } else {
            None
        }
    }
}

// ============================================================================
// Deduplication
// ============================================================================

/// Ordered clip collection that keeps the first clip seen for each id
#[derive(Debug, Clone, Default)]
pub struct UniqueClips {
    seen: HashSet<String>,
    clips: Vec<Clip>,
}

impl UniqueClips {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with ids that must be treated as already present
    pub fn excluding<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seen: ids.into_iter().map(Into::into).collect(),
            clips: Vec::new(),
        }
    }

    /// Add a clip; returns `false` if its id was already present
    pub fn push(&mut self, clip: Clip) -> bool {
        if self.seen.insert(clip.id.clone()) {
            self.clips.push(clip);
            true
        } else {
            false
        }
    }

    /// Add every clip not yet seen, returning how many were added
    pub fn extend<I: IntoIterator<Item = Clip>>(&mut self, clips: I) -> usize {
        let mut added = 0;
        for clip in clips {
            if self.push(clip) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of clips held (excluded ids are not counted)
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn as_slice(&self) -> &[Clip] {
        &self.clips
    }

    pub fn into_vec(self) -> Vec<Clip> {
        self.clips
    }
}

impl FromIterator<Clip> for UniqueClips {
    fn from_iter<I: IntoIterator<Item = Clip>>(iter: I) -> Self {
        let mut unique = Self::new();
        unique.extend(iter);
        unique
    }
}
