//! Clip ordering strategies
//!
//! All functions return a new ordering and leave their input untouched. The
//! random source is passed in so callers (and tests) decide how it is seeded.

use cliptwitch::Clip;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

/// Number of popularity buckets used by [`stratified_shuffle`]
pub const STRATA: usize = 4;

/// Diversity used when the weighted strategy is picked explicitly
pub const DEFAULT_DIVERSITY: f64 = 0.4;

/// Diversity used by [`smart_shuffle`] for mid-size pools
pub const SMART_DIVERSITY: f64 = 0.3;

/// Pools larger than this are stratified by [`smart_shuffle`]
pub const SMART_STRATIFIED_ABOVE: usize = 200;

/// Pools larger than this (and not stratified) are weighted by [`smart_shuffle`]
pub const SMART_WEIGHTED_ABOVE: usize = 50;

/// How a playlist is ordered
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ShuffleStrategy {
    Uniform,
    Stratified,
    /// Popularity-biased, with the given diversity in `[0, 1]`
    Weighted(f64),
    /// Pick one of the others from the pool size, each time it is applied
    #[default]
    Smart,
}

impl ShuffleStrategy {
    /// The concrete strategy used for a pool of `len` clips
    pub fn resolve(self, len: usize) -> ShuffleStrategy {
        match self {
            ShuffleStrategy::Smart if len > SMART_STRATIFIED_ABOVE => ShuffleStrategy::Stratified,
            ShuffleStrategy::Smart if len > SMART_WEIGHTED_ABOVE => {
                ShuffleStrategy::Weighted(SMART_DIVERSITY)
            }
            ShuffleStrategy::Smart => ShuffleStrategy::Uniform,
            concrete => concrete,
        }
    }

    /// Order `clips` with this strategy
    pub fn apply<R: Rng + ?Sized>(self, clips: &[Clip], rng: &mut R) -> Vec<Clip> {
        match self.resolve(clips.len()) {
            ShuffleStrategy::Stratified => stratified_shuffle(clips, rng),
            ShuffleStrategy::Weighted(diversity) => weighted_shuffle(clips, diversity, rng),
            ShuffleStrategy::Uniform | ShuffleStrategy::Smart => uniform_shuffle(clips, rng),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShuffleStrategy::Uniform => "uniform",
            ShuffleStrategy::Stratified => "stratified",
            ShuffleStrategy::Weighted(_) => "weighted",
            ShuffleStrategy::Smart => "smart",
        }
    }
}

impl fmt::Display for ShuffleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShuffleStrategy::Weighted(d) => write!(f, "weighted({})", d),
            other => f.write_str(other.name()),
        }
    }
}

#[cfg(feature = "clipconfig")]
impl From<clipconfig::ShuffleMode> for ShuffleStrategy {
    fn from(mode: clipconfig::ShuffleMode) -> Self {
        use clipconfig::ShuffleMode;
        match mode {
            ShuffleMode::Uniform => ShuffleStrategy::Uniform,
            ShuffleMode::Stratified => ShuffleStrategy::Stratified,
            ShuffleMode::Weighted => ShuffleStrategy::Weighted(DEFAULT_DIVERSITY),
            ShuffleMode::Smart => ShuffleStrategy::Smart,
        }
    }
}

/// Unbiased Fisher-Yates permutation
pub fn uniform_shuffle<R: Rng + ?Sized>(clips: &[Clip], rng: &mut R) -> Vec<Clip> {
    let mut out = clips.to_vec();
    out.shuffle(rng);
    out
}

/// Alternate popular and obscure clips
///
/// Clips are ranked by view count, cut into [`STRATA`] equal rank buckets,
/// shuffled within each bucket, then dealt one bucket at a time.
pub fn stratified_shuffle<R: Rng + ?Sized>(clips: &[Clip], rng: &mut R) -> Vec<Clip> {
    if clips.len() <= 1 {
        return clips.to_vec();
    }

    let mut ranked = clips.to_vec();
    ranked.sort_by(|a, b| b.view_count.cmp(&a.view_count));

    let bucket_size = ranked.len().div_ceil(STRATA);
    let mut buckets: Vec<std::vec::IntoIter<Clip>> = ranked
        .chunks(bucket_size)
        .map(|chunk| {
            let mut bucket = chunk.to_vec();
            bucket.shuffle(rng);
            bucket.into_iter()
        })
        .collect();

    let mut out = Vec::with_capacity(clips.len());
    while out.len() < clips.len() {
        for bucket in buckets.iter_mut() {
            if let Some(clip) = bucket.next() {
                out.push(clip);
            }
        }
    }
    out
}

/// Popularity-biased permutation
///
/// Each clip weighs `normalized_views * (1 - diversity) + diversity`, with
/// views mapped linearly from the pool's `[min, max]` onto `[0, 1]`. Clips are
/// drawn without replacement in proportion to their weight.
pub fn weighted_shuffle<R: Rng + ?Sized>(clips: &[Clip], diversity: f64, rng: &mut R) -> Vec<Clip> {
    if clips.len() <= 1 {
        return clips.to_vec();
    }

    let diversity = if diversity.is_finite() {
        diversity.clamp(0.0, 1.0)
    } else {
        DEFAULT_DIVERSITY
    };
    let min = clips.iter().map(|c| c.view_count).min().unwrap_or(0);
    let max = clips.iter().map(|c| c.view_count).max().unwrap_or(0);
    let range = (max - min) as f64;

    let mut pool: Vec<(f64, &Clip)> = clips
        .iter()
        .map(|clip| {
            let normalized = if range > 0.0 {
                (clip.view_count - min) as f64 / range
            } else {
                1.0
            };
            (normalized * (1.0 - diversity) + diversity, clip)
        })
        .collect();

    let mut out = Vec::with_capacity(clips.len());
    while !pool.is_empty() {
        let total: f64 = pool.iter().map(|(weight, _)| weight).sum();
        let index = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            pool.iter()
                .position(|(weight, _)| {
                    if target < *weight {
                        true
                    } else {
                        target -= weight;
                        false
                    }
                })
                .unwrap_or(pool.len() - 1)
        } else {
            rng.random_range(0..pool.len())
        };
        let (_, clip) = pool.swap_remove(index);
        out.push(clip.clone());
    }
    out
}

/// Pool-size dependent choice between the other strategies
pub fn smart_shuffle<R: Rng + ?Sized>(clips: &[Clip], rng: &mut R) -> Vec<Clip> {
    ShuffleStrategy::Smart.apply(clips, rng)
}
