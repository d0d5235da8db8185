//! Clip filters applied before anything enters a playlist

use chrono::{DateTime, TimeDelta, Utc};
use cliptwitch::Clip;

/// Keep clips created within `days` of `now`
///
/// A clip created exactly at the cutoff is kept. `days == 0` disables the
/// filter.
pub fn filter_by_date_range(clips: Vec<Clip>, days: u64, now: DateTime<Utc>) -> Vec<Clip> {
    let Some(cutoff) = cutoff(days, now) else {
        return clips;
    };
    clips
        .into_iter()
        .filter(|clip| clip.created_at >= cutoff)
        .collect()
}

/// Keep clips with at least `min_views` views
pub fn filter_by_min_views(clips: Vec<Clip>, min_views: u64) -> Vec<Clip> {
    if min_views == 0 {
        return clips;
    }
    clips
        .into_iter()
        .filter(|clip| clip.view_count >= min_views)
        .collect()
}

/// Date range then view count
pub fn apply_filters(clips: Vec<Clip>, days: u64, min_views: u64, now: DateTime<Utc>) -> Vec<Clip> {
    let before = clips.len();
    let clips = filter_by_min_views(filter_by_date_range(clips, days, now), min_views);
    if clips.len() < before {
        tracing::debug!(
            before,
            after = clips.len(),
            days,
            min_views,
            "Filtered clips"
        );
    }
    clips
}

fn cutoff(days: u64, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if days == 0 {
        return None;
    }
    let delta = TimeDelta::try_days(i64::try_from(days).ok()?)?;
    now.checked_sub_signed(delta)
}
