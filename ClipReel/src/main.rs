//! ClipReel: endless Twitch clip playback from the command line
//!
//! ```text
//! clipreel "channelName=foo,bar&days=30&shuffle=weighted" [clip-count]
//! ```
//!
//! The first argument uses the player's query-string format. Without a clip
//! count the session loops forever.

mod player;

use clipconfig::{get_config, PlayerSettings};
use clipplaylist::PlaylistManager;
use player::{LogPlayer, Session};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Longest time the log player spends on a single clip
const MAX_CLIP_TIME: Duration = Duration::from_secs(5);

/// Base used when logging the shareable player URL
const PLAYER_BASE_URL: &str = "http://localhost:8080/player";

const USAGE: &str = "usage: clipreel <query-string> [clip-count]";

fn init_logging(min_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(min_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = get_config()?;
    let min_level = config
        .get_log_min_level()
        .unwrap_or_else(|_| "info".to_string());
    init_logging(&min_level.to_lowercase());

    let mut args = std::env::args().skip(1);
    let query = args.next().ok_or(USAGE)?;
    let limit = args.next().map(|n| n.parse::<usize>()).transpose()?;

    // ========== PHASE 1: Settings ==========
    info!("📋 Reading player settings...");
    let settings = PlayerSettings::from_query_with_config(&query, &config)?;
    info!(
        channels = %settings.channels.join(","),
        days = settings.days,
        views = settings.views,
        shuffle = %settings.shuffle.as_str(),
        "✅ Player settings ready"
    );
    match settings.player_url(PLAYER_BASE_URL) {
        Ok(url) => info!("🔗 Player URL: {}", url),
        Err(e) => tracing::warn!("Cannot build player URL: {}", e),
    }

    // ========== PHASE 2: Playlist ==========
    info!("🎬 Loading clips...");
    let playlist = PlaylistManager::from_config(&config).await?;
    let loaded = playlist
        .load_initial(
            settings.channels.as_slice(),
            settings.days,
            settings.views,
            settings.shuffle.into(),
        )
        .await?;
    info!(clips = loaded, strategy = %playlist.strategy(), "✅ Playlist ready");

    // ========== PHASE 3: Playback ==========
    let mut session = Session::new(playlist.clone(), LogPlayer::new(MAX_CLIP_TIME));
    tokio::select! {
        report = session.run(limit) => {
            info!(
                played = report.played,
                unplayable = report.unplayable,
                failed = report.failed,
                "🏁 Session finished"
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Interrupted");
        }
    }

    let stats = playlist.stats();
    info!(
        total = stats.total_clips,
        index = stats.current_index,
        remaining = stats.remaining_clips,
        "📊 Final playlist state"
    );
    Ok(())
}
