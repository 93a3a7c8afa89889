mod catalog;
mod logging;

use catalog::DEFAULT_LATEST_COUNT;
use pmoconfig::get_config;
use pmogist::RemoteConfigStore;
use pmoyoutube::{MetadataFetcher, YoutubeConfigExt};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_config();
    logging::init_logging(&config);

    info!("🎬 Starting PMOVideos...");

    // ========== Sources ==========
    let store = RemoteConfigStore::from_config(&config)?;
    if !store.is_configured() {
        warn!("⚠️ Set sources.gist.id and sources.gist.token in config.yaml");
    }
    let status = store.check_connection().await;
    info!(success = status.success, "📡 Gist connection: {}", status.message);

    let fetcher = Arc::new(MetadataFetcher::from_config(&config)?);
    let cleanup = fetcher.spawn_cleanup_task(config.get_youtube_cache_cleanup_interval()?);

    // ========== Catalogue ==========
    let document = store.get_config(true).await?;
    let categories = catalog::normalize_categories(&document);
    info!("📚 {} categorie(s) in catalog", categories.len());

    for category in &categories {
        let grouped = catalog::load_category(&fetcher, category).await?;
        info!("  - {}", category.id);
        for (subcategory, videos) in &grouped {
            info!("      {} : {} video(s)", subcategory, videos.len());
        }
    }

    let count = config.get_u64(&["catalog", "latest_count"], DEFAULT_LATEST_COUNT as u64)? as usize;
    let latest = catalog::latest_videos(&fetcher, &categories, count).await?;

    println!("Latest videos:");
    for video in &latest {
        println!(
            "  {}  {}  [{}]  {} views",
            video.published_at.as_deref().unwrap_or("-"),
            video.title,
            video.duration,
            video.views
        );
    }

    let stats = fetcher.stats();
    info!(
        entries = stats.cache.total,
        valid = stats.cache.valid,
        "✅ Metadata cache"
    );

    cleanup.abort();
    fetcher.destroy();
    Ok(())
}
