//! Multi-strategy clip fetching
//!
//! A single time filter returns the same top clips over and over. To build a
//! more varied pool the fetcher queries several filters at once, merges them
//! in a fixed priority order, and tops the pool up from the all-time listing
//! when the merge is too thin.

use crate::error::Result;
use crate::models::{Clip, FetchResult, PaginationCursor, TimeFilter, UniqueClips};
use crate::source::ClipSource;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Default number of clips requested per page
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Below this many clips the all-time fallback kicks in
pub const DEFAULT_LOW_YIELD_FLOOR: usize = 20;

/// Pages fetched by the low-yield fallback
pub const DEFAULT_FALLBACK_PAGES: usize = 3;

/// Delay between two sequential page requests
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(100);

/// Tuning knobs of the fetcher
#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub page_size: u32,
    pub low_yield_floor: usize,
    pub fallback_pages: usize,
    pub pacing_delay: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            low_yield_floor: DEFAULT_LOW_YIELD_FLOOR,
            fallback_pages: DEFAULT_FALLBACK_PAGES,
            pacing_delay: DEFAULT_PACING_DELAY,
        }
    }
}

/// Result of [`MultiStrategyFetcher::fetch_diverse`] for one channel
///
/// `result.has_next_page` and `result.end_cursor` describe the primary filter
/// only.
#[derive(Debug, Clone)]
pub struct DiverseFetch {
    pub channel: String,
    pub primary_filter: TimeFilter,
    pub result: FetchResult,
}

impl DiverseFetch {
    fn empty(channel: &str, primary_filter: TimeFilter) -> Self {
        Self {
            channel: channel.to_string(),
            primary_filter,
            result: FetchResult::empty(),
        }
    }

    /// Where background pagination for this channel resumes
    pub fn channel_cursor(&self) -> ChannelCursor {
        ChannelCursor {
            channel: self.channel.clone(),
            filter: self.primary_filter,
            end_cursor: self.result.end_cursor.clone(),
            has_next_page: self.result.has_next_page,
        }
    }
}

/// Retained pagination state of a channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelCursor {
    pub channel: String,
    pub filter: TimeFilter,
    pub end_cursor: Option<PaginationCursor>,
    pub has_next_page: bool,
}

impl ChannelCursor {
    /// Cursor to resume from, if the channel has more pages
    pub fn resume_from(&self) -> Option<&PaginationCursor> {
        if self.has_next_page {
            self.end_cursor.as_ref()
        } else {
            None
        }
    }
}

/// Union of several channels' diverse fetches
#[derive(Debug, Clone, Default)]
pub struct MultiChannelFetch {
    pub clips: Vec<Clip>,
    pub cursors: Vec<ChannelCursor>,
}

/// Clips collected by walking a cursor chain
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub clips: Vec<Clip>,
    /// Last cursor reached; pagination can resume from here
    pub end_cursor: Option<PaginationCursor>,
    pub has_next_page: bool,
    /// Number of pages actually fetched
    pub pages: usize,
}

/// The filters queried for a primary filter, in merge priority order
pub fn diverse_filters(primary: TimeFilter) -> Vec<TimeFilter> {
    let mut filters = Vec::with_capacity(4);
    for filter in [
        primary,
        TimeFilter::AllTime,
        TimeFilter::LastWeek,
        TimeFilter::LastMonth,
    ] {
        if !filters.contains(&filter) {
            filters.push(filter);
        }
    }
    filters
}

/// Fetches varied clip pools from a [`ClipSource`]
#[derive(Clone)]
pub struct MultiStrategyFetcher {
    source: Arc<dyn ClipSource>,
    settings: FetchSettings,
}

impl MultiStrategyFetcher {
    pub fn new(source: Arc<dyn ClipSource>) -> Self {
        Self::with_settings(source, FetchSettings::default())
    }

    pub fn with_settings(source: Arc<dyn ClipSource>, settings: FetchSettings) -> Self {
        Self { source, settings }
    }

    pub fn source(&self) -> &Arc<dyn ClipSource> {
        &self.source
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetch a deduplicated pool of clips of `channel` across several filters
    ///
    /// Never fails: per-filter failures are skipped, and if every filter and
    /// the final all-time attempt fail the result is empty.
    pub async fn fetch_diverse(&self, channel: &str, days: u64) -> DiverseFetch {
        let primary = TimeFilter::from_days(days);
        let filters = diverse_filters(primary);
        let page_size = self.settings.page_size;

        tracing::debug!(
            channel = %channel,
            days,
            primary = %primary,
            filters = filters.len(),
            "Fetching diverse clips"
        );

        let outcomes = join_all(filters.iter().map(|&filter| async move {
            let outcome = self.source.fetch_page(channel, page_size, filter, None).await;
            (filter, outcome)
        }))
        .await;

        let mut unique = UniqueClips::new();
        let mut has_next_page = false;
        let mut end_cursor = None;
        let mut failures = 0;

        for (filter, outcome) in outcomes {
            match outcome {
                Ok(page) => {
                    tracing::debug!(
                        channel = %channel,
                        filter = %filter,
                        clips = page.clips.len(),
                        "Filter fetch succeeded"
                    );
                    if filter == primary {
                        has_next_page = page.has_next_page;
                        end_cursor = page.end_cursor;
                    }
                    unique.extend(page.clips);
                }
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        channel = %channel,
                        filter = %filter,
                        error = %e,
                        "Filter fetch failed"
                    );
                }
            }
        }

        if failures == filters.len() {
            return self.last_resort(channel, primary).await;
        }

        tracing::info!(
            channel = %channel,
            clips = unique.len(),
            filters = filters.len(),
            "Combined unique clips"
        );

        if unique.len() < self.settings.low_yield_floor {
            self.low_yield_fallback(channel, &mut unique).await;
        }

        DiverseFetch {
            channel: channel.to_string(),
            primary_filter: primary,
            result: FetchResult {
                clips: unique.into_vec(),
                has_next_page,
                end_cursor,
            },
        }
    }

    /// Run [`fetch_diverse`](Self::fetch_diverse) for every channel concurrently
    /// and union the results in channel order
    pub async fn fetch_diverse_multi<S: AsRef<str>>(
        &self,
        channels: &[S],
        days: u64,
    ) -> MultiChannelFetch {
        let fetches = join_all(
            channels
                .iter()
                .map(|channel| self.fetch_diverse(channel.as_ref(), days)),
        )
        .await;

        let mut unique = UniqueClips::new();
        let mut cursors = Vec::with_capacity(fetches.len());
        for fetch in fetches {
            cursors.push(fetch.channel_cursor());
            unique.extend(fetch.result.clips);
        }

        MultiChannelFetch {
            clips: unique.into_vec(),
            cursors,
        }
    }

    /// Walk the cursor chain of `filter` starting at `start`
    ///
    /// Stops after `ceil(max_clips / page_size)` pages, on an empty page, when
    /// no further page is announced, or when the API hands back a cursor it
    /// already gave (which would otherwise loop forever). A failure on the
    /// first page is returned; later failures end the walk with what was
    /// collected so far.
    pub async fn paginate(
        &self,
        channel: &str,
        filter: TimeFilter,
        start: Option<PaginationCursor>,
        max_clips: usize,
    ) -> Result<Pagination> {
        let page_size = self.settings.page_size.max(1);
        let max_pages = max_clips.div_ceil(page_size as usize);

        let mut seen_cursors: HashSet<PaginationCursor> = start.iter().cloned().collect();
        let mut out = Pagination {
            clips: Vec::new(),
            end_cursor: start,
            has_next_page: true,
            pages: 0,
        };

        while out.pages < max_pages && out.clips.len() < max_clips {
            if out.pages > 0 && !self.settings.pacing_delay.is_zero() {
                tokio::time::sleep(self.settings.pacing_delay).await;
            }

            let page = match self
                .source
                .fetch_page(channel, page_size, filter, out.end_cursor.as_ref())
                .await
            {
                Ok(page) => page,
                Err(e) if out.pages == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        filter = %filter,
                        pages = out.pages,
                        error = %e,
                        "Pagination interrupted"
                    );
                    break;
                }
            };
            out.pages += 1;

            if page.clips.is_empty() {
                tracing::debug!(channel = %channel, filter = %filter, "Empty page, stopping");
                out.has_next_page = false;
                break;
            }
            let next = page.next_cursor().cloned();
            out.clips.extend(page.clips);

            match next {
                None => {
                    out.has_next_page = false;
                    break;
                }
                Some(cursor) if !seen_cursors.insert(cursor.clone()) => {
                    tracing::error!(
                        channel = %channel,
                        filter = %filter,
                        cursor = %cursor.preview(),
                        "Pagination cursor did not advance, stopping"
                    );
                    out.has_next_page = false;
                    break;
                }
                Some(cursor) => out.end_cursor = Some(cursor),
            }
        }

        tracing::debug!(
            channel = %channel,
            filter = %filter,
            clips = out.clips.len(),
            pages = out.pages,
            "Pagination finished"
        );
        Ok(out)
    }

    async fn low_yield_fallback(&self, channel: &str, unique: &mut UniqueClips) {
        tracing::info!(
            channel = %channel,
            clips = unique.len(),
            "Low clip count, paging through all-time clips"
        );
        let max_clips = self.settings.fallback_pages * self.settings.page_size as usize;
        match self
            .paginate(channel, TimeFilter::AllTime, None, max_clips)
            .await
        {
            Ok(pagination) => {
                let added = unique.extend(pagination.clips);
                tracing::info!(channel = %channel, added, "Added clips from all-time fallback");
            }
            Err(e) => {
                tracing::warn!(channel = %channel, error = %e, "All-time fallback failed");
            }
        }
    }

    async fn last_resort(&self, channel: &str, primary: TimeFilter) -> DiverseFetch {
        tracing::warn!(
            channel = %channel,
            "Every filter failed, trying a single all-time page"
        );
        match self
            .source
            .fetch_page(channel, self.settings.page_size, TimeFilter::AllTime, None)
            .await
        {
            Ok(page) => DiverseFetch {
                channel: channel.to_string(),
                primary_filter: TimeFilter::AllTime,
                result: FetchResult {
                    clips: page.clips.into_iter().collect::<UniqueClips>().into_vec(),
                    has_next_page: page.has_next_page,
                    end_cursor: page.end_cursor,
                },
            },
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "All clip fetches failed");
                DiverseFetch::empty(channel, primary)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diverse_filters_dedup() {
        assert_eq!(
            diverse_filters(TimeFilter::LastDay),
            vec![
                TimeFilter::LastDay,
                TimeFilter::AllTime,
                TimeFilter::LastWeek,
                TimeFilter::LastMonth
            ]
        );
        assert_eq!(
            diverse_filters(TimeFilter::LastWeek),
            vec![TimeFilter::LastWeek, TimeFilter::AllTime, TimeFilter::LastMonth]
        );
        assert_eq!(
            diverse_filters(TimeFilter::AllTime),
            vec![TimeFilter::AllTime, TimeFilter::LastWeek, TimeFilter::LastMonth]
        );
    }

    #[test]
    fn test_channel_cursor_resume() {
        let cursor = ChannelCursor {
            channel: "c".into(),
            filter: TimeFilter::AllTime,
            end_cursor: Some("abc".into()),
            has_next_page: false,
        };
        assert!(cursor.resume_from().is_none());
    }
}
