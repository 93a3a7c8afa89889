//! Récupération des métadonnées par lots avec cache, ré-essai et annulation
//!
//! # Exemple
//!
//! ```no_run
//! use pmoyoutube::{ItemReference, MetadataFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = MetadataFetcher::builder().api_key("my-key").build()?;
//!     let refs = vec![ItemReference::new("music_1", "dQw4w9WgXcQ")];
//!     for video in fetcher.fetch_batch(&refs, None).await? {
//!         println!("{} ({})", video.title, video.duration);
//!     }
//!     Ok(())
//! }
//! ```

use crate::api::{DEFAULT_API_BASE, YoutubeApi};
use crate::cache::{CacheStats, DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL, ResultCache, composite_key};
use crate::config_ext::YoutubeConfigExt;
use crate::coordinator::RequestCoordinator;
use crate::error::{Result, YoutubeError};
use crate::models::{ItemReference, NormalizedMetadata};
use crate::normalize::{DEFAULT_MAX_DESCRIPTION_LENGTH, Normalizer};
use pmoconfig::Config;
use pmoutils::RetryPolicy;
use reqwest::Client;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Taille maximale d'un lot accepté par l'API
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Délai par défaut d'une tentative réseau
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Intervalle par défaut du nettoyage périodique du cache
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Default User-Agent
pub const DEFAULT_USER_AGENT: &str = "pmoyoutube/0.1.0";

/// Statistiques du fetcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FetcherStats {
    pub cache: CacheStats,
    pub pending_requests: usize,
    pub destroyed: bool,
}

/// Fetcher de métadonnées YouTube
pub struct MetadataFetcher {
    api: YoutubeApi,
    cache: ResultCache<Vec<NormalizedMetadata>>,
    coordinator: RequestCoordinator,
    normalizer: Normalizer,
    retry: RetryPolicy,
    request_timeout: Duration,
    max_batch_size: usize,
    destroyed: AtomicBool,
}

impl MetadataFetcher {
    pub fn builder() -> MetadataFetcherBuilder {
        MetadataFetcherBuilder::default()
    }

    /// Construit le fetcher depuis la section `sources.youtube` de la configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder()
            .api_base(config.get_youtube_api_base()?)
            .max_batch_size(config.get_youtube_max_batch_size()?)
            .cache_size(config.get_youtube_cache_max_entries()?)
            .cache_ttl(config.get_youtube_cache_ttl()?)
            .request_timeout(config.get_youtube_request_timeout()?)
            .max_description_length(config.get_youtube_max_description_length()?)
            .retry(config.get_youtube_retry_policy()?);

        if let Some(key) = config.get_youtube_api_key()? {
            builder = builder.api_key(key);
        }
        builder.build()
    }

    /// Récupère les métadonnées d'un lot de références
    ///
    /// Une référence absente de la réponse de l'API donne un placeholder. Le
    /// lot complet est mis en cache sous une clé composite : un appel servi
    /// depuis le cache rend la liste dans l'ordre de la première requête pour
    /// le même ensemble d'ids. Les appelants associent donc les résultats par
    /// `external_id`, pas par position.
    pub async fn fetch_batch(
        &self,
        refs: &[ItemReference],
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<NormalizedMetadata>> {
        if self.is_destroyed() || refs.is_empty() {
            return Ok(Vec::new());
        }

        if refs.len() > self.max_batch_size {
            return Err(YoutubeError::InvalidRequest(format!(
                "batch of {} ids exceeds the limit of {}",
                refs.len(),
                self.max_batch_size
            )));
        }

        let key = composite_key(refs.iter().map(|r| r.external_id.as_str()));
        if let Some(cached) = self.cache.get(&key) {
            debug!(key = %key, "Metadata cache hit");
            return Ok(cached);
        }

        let ids: Vec<&str> = refs.iter().map(|r| r.external_id.as_str()).collect();
        let api = &self.api;
        let coordinator = &self.coordinator;
        let ids = &ids;
        let timeout = self.request_timeout;

        let items = coordinator
            .track(self.retry.run(move |attempt| {
                debug!(attempt, count = ids.len(), "Requesting metadata batch");
                coordinator.guard(cancel, timeout, api.fetch_videos(ids))
            }))
            .await?;

        let results: Vec<NormalizedMetadata> = refs
            .iter()
            .map(|reference| {
                items
                    .iter()
                    .find(|item| item.id == reference.external_id)
                    .map(|item| self.normalizer.normalize(item, reference))
                    .unwrap_or_else(|| self.normalizer.placeholder(reference))
            })
            .collect();

        if !self.is_destroyed() {
            self.cache.set(key, results.clone());
        }
        Ok(results)
    }

    /// Annule toutes les requêtes en cours
    pub fn abort_all(&self) {
        if !self.is_destroyed() {
            self.coordinator.abort_all();
        }
    }

    pub fn clear_cache(&self) {
        if !self.is_destroyed() {
            self.cache.clear();
        }
    }

    /// Supprime les entrées expirées du cache
    pub fn cleanup_cache(&self) -> usize {
        let removed = self.cache.cleanup();
        if removed > 0 {
            debug!(removed, "Removed expired metadata cache entries");
        }
        removed
    }

    pub fn stats(&self) -> FetcherStats {
        FetcherStats {
            cache: self.cache.stats(),
            pending_requests: self.coordinator.pending_count(),
            destroyed: self.is_destroyed(),
        }
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Annule les requêtes, vide le cache ; les lots suivants sont vides
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.coordinator.destroy();
        self.cache.destroy();
        info!("🧹 Metadata fetcher destroyed");
    }

    /// Lance le nettoyage périodique du cache
    ///
    /// La tâche s'arrête d'elle-même quand le fetcher est libéré ou détruit.
    pub fn spawn_cleanup_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // Le premier tick est immédiat
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(fetcher) = weak.upgrade() else {
                    break;
                };
                if fetcher.is_destroyed() {
                    break;
                }
                fetcher.cleanup_cache();
            }
        })
    }
}

/// Builder pour [`MetadataFetcher`]
#[derive(Debug, Clone)]
pub struct MetadataFetcherBuilder {
    client: Option<Client>,
    api_base: String,
    api_key: Option<String>,
    max_batch_size: usize,
    cache_size: usize,
    cache_ttl: Duration,
    request_timeout: Duration,
    retry: RetryPolicy,
    max_description_length: usize,
}

impl Default for MetadataFetcherBuilder {
    fn default() -> Self {
        Self {
            client: None,
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
            max_description_length: DEFAULT_MAX_DESCRIPTION_LENGTH,
        }
    }
}

impl MetadataFetcherBuilder {
    /// Set a custom reqwest client
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the API base URL (useful for tests)
    pub fn api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size.max(1);
        self
    }

    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_description_length(mut self, length: usize) -> Self {
        self.max_description_length = length;
        self
    }

    pub fn build(self) -> Result<MetadataFetcher> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(DEFAULT_USER_AGENT).build()?,
        };

        if self.api_key.as_deref().is_none_or(|key| key.trim().is_empty()) {
            warn!("YouTube API key not configured, metadata requests will fail");
        }

        Ok(MetadataFetcher {
            api: YoutubeApi::new(client, self.api_base, self.api_key, self.max_batch_size),
            cache: ResultCache::new(self.cache_size, self.cache_ttl),
            coordinator: RequestCoordinator::new(),
            normalizer: Normalizer::new(self.max_description_length),
            retry: self.retry,
            request_timeout: self.request_timeout,
            max_batch_size: self.max_batch_size,
            destroyed: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher() -> MetadataFetcher {
        MetadataFetcher::builder()
            .api_base("http://127.0.0.1:9")
            .api_key("test")
            .max_batch_size(2)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_batch_returns_immediately() {
        let result = fetcher().fetch_batch(&[], None).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_batch_is_rejected() {
        let refs: Vec<_> = (0..3)
            .map(|i| ItemReference::new(format!("c_{}", i), format!("v{}", i)))
            .collect();
        let result = fetcher().fetch_batch(&refs, None).await;
        assert!(matches!(result, Err(YoutubeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_destroyed_fetcher_returns_empty() {
        let fetcher = fetcher();
        fetcher.destroy();
        let result = fetcher
            .fetch_batch(&[ItemReference::new("c_1", "v1")], None)
            .await
            .unwrap();
        assert!(result.is_empty());
        assert!(fetcher.stats().destroyed);
    }
}
