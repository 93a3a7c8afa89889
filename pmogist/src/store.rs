//! Stockage distant du catalogue éditorial
//!
//! Le document est lu en entier, modifié en mémoire puis réécrit en entier à
//! chaque édition. Les lectures passent par un cache à durée de vie limitée ;
//! en cas d'échec réseau, le dernier document connu est servi.
//!
//! Deux éditions concurrentes ne sont pas sérialisées : la dernière écriture
//! gagne.
//!
//! # Exemple
//!
//! ```no_run
//! use pmogist::{RemoteConfigStore, VideoEntry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RemoteConfigStore::builder()
//!         .gist_id("0123456789abcdef")
//!         .token("ghp_xxx")
//!         .build()?;
//!
//!     let id = store
//!         .add_video("music", Some("live"), VideoEntry::new("dQw4w9WgXcQ"))
//!         .await?;
//!     println!("added {}", id);
//!     Ok(())
//! }
//! ```

use crate::api::{DEFAULT_API_BASE, DEFAULT_FILE_NAME, GistApi};
use crate::config_ext::GistConfigExt;
use crate::document::{RemoteDocument, VideoEntry};
use crate::error::Result;
use parking_lot::Mutex;
use pmoconfig::Config;
use pmoutils::RetryPolicy;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Durée de vie par défaut du document en cache
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Délai par défaut d'une requête vers GitHub
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Default User-Agent (GitHub refuse les requêtes sans User-Agent)
pub const DEFAULT_USER_AGENT: &str = "pmogist/0.1.0";

/// Identifiant d'abonnement renvoyé par [`RemoteConfigStore::on_update`]
pub type SubscriptionId = u64;

type UpdateCallback = Arc<dyn Fn(&RemoteDocument) + Send + Sync>;

struct CachedDocument {
    document: RemoteDocument,
    stored_at: Instant,
}

/// Résultat de [`RemoteConfigStore::check_connection`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub success: bool,
    pub message: String,
}

pub struct RemoteConfigStore {
    api: GistApi,
    retry: RetryPolicy,
    cache_ttl: Duration,
    cache: Mutex<Option<CachedDocument>>,
    subscribers: Mutex<Vec<(SubscriptionId, UpdateCallback)>>,
    next_subscription: AtomicU64,
}

impl RemoteConfigStore {
    pub fn builder() -> RemoteConfigStoreBuilder {
        RemoteConfigStoreBuilder::default()
    }

    /// Construit le store depuis la section `sources.gist` de la configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::builder()
            .api_base(config.get_gist_api_base()?)
            .file_name(config.get_gist_file_name()?)
            .cache_ttl(config.get_gist_cache_ttl()?)
            .request_timeout(config.get_gist_request_timeout()?)
            .retry(config.get_gist_retry_policy()?);

        if let Some(id) = config.get_gist_id()? {
            builder = builder.gist_id(id);
        }
        if let Some(token) = config.get_gist_token()? {
            builder = builder.token(token);
        }
        builder.build()
    }

    /// Lit le document
    ///
    /// Avec `use_cache`, un document en cache encore valide est renvoyé sans
    /// requête. Si la lecture distante échoue, le dernier document connu est
    /// renvoyé à la place de l'erreur.
    pub async fn get_config(&self, use_cache: bool) -> Result<RemoteDocument> {
        if use_cache {
            if let Some(document) = self.fresh_cached() {
                debug!("Catalog cache hit");
                return Ok(document);
            }
        }

        match self.load_remote().await {
            Ok(document) => {
                info!(
                    categories = document.categories.len(),
                    videos = document.video_count(),
                    "📥 Catalog loaded from gist"
                );
                self.store_cache(document.clone());
                Ok(document)
            }
            Err(err) => {
                error!("Failed to load catalog from gist: {}", err);
                match self.cache.lock().as_ref() {
                    Some(cached) => {
                        warn!("Using last known catalog");
                        Ok(cached.document.clone())
                    }
                    None => Err(err),
                }
            }
        }
    }

    async fn load_remote(&self) -> Result<RemoteDocument> {
        let api = &self.api;
        let text = self
            .retry
            .run(|attempt| {
                debug!(attempt, "Fetching catalog gist");
                api.fetch_config_text()
            })
            .await?;
        RemoteDocument::from_json(&text)
    }

    /// Réécrit le document complet
    ///
    /// En cas de succès le cache est remplacé et les abonnés sont notifiés.
    pub async fn update_config(&self, document: RemoteDocument) -> Result<()> {
        let content = document.to_json_pretty()?;
        let api = &self.api;
        let content = content.as_str();

        self.retry
            .run(|attempt| {
                debug!(attempt, "Writing catalog gist");
                api.update_gist(content)
            })
            .await
            .inspect_err(|err| error!("Failed to update gist: {}", err))?;

        info!(file = %self.api.file_name(), "📤 Catalog written to gist");
        self.store_cache(document.clone());
        self.notify(&document);
        Ok(())
    }

    /// Variante de [`update_config`](Self::update_config) pour un document JSON brut
    pub async fn update_config_json(&self, text: &str) -> Result<()> {
        let document = RemoteDocument::from_json(text)?;
        self.update_config(document).await
    }

    /// Ajoute une vidéo et renvoie son identifiant (généré si absent)
    pub async fn add_video(
        &self,
        category_id: &str,
        subcategory_id: Option<&str>,
        entry: VideoEntry,
    ) -> Result<String> {
        let mut document = self.get_config(false).await?;
        let id = document.insert_video(category_id, subcategory_id, entry)?;
        self.update_config(document).await?;
        info!(video_id = %id, category = %category_id, "➕ Video added");
        Ok(id)
    }

    /// Fusionne `patch` dans une vidéo existante
    pub async fn update_video(
        &self,
        category_id: &str,
        subcategory_id: Option<&str>,
        video_id: &str,
        patch: &Map<String, Value>,
    ) -> Result<()> {
        let mut document = self.get_config(false).await?;
        document.update_video(category_id, subcategory_id, video_id, patch)?;
        self.update_config(document).await?;
        info!(video_id = %video_id, category = %category_id, "✏️ Video updated");
        Ok(())
    }

    pub async fn remove_video(
        &self,
        category_id: &str,
        subcategory_id: Option<&str>,
        video_id: &str,
    ) -> Result<()> {
        let mut document = self.get_config(false).await?;
        document.remove_video(category_id, subcategory_id, video_id)?;
        self.update_config(document).await?;
        info!(video_id = %video_id, category = %category_id, "🗑️ Video removed");
        Ok(())
    }

    /// Abonne `callback` aux écritures réussies
    pub fn on_update<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&RemoteDocument) + Send + Sync + 'static,
    {
        let id = self.next_subscription.fetch_add(1, Ordering::SeqCst);
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    fn notify(&self, document: &RemoteDocument) {
        let callbacks: Vec<(SubscriptionId, UpdateCallback)> = self
            .subscribers
            .lock()
            .iter()
            .map(|(id, callback)| (*id, callback.clone()))
            .collect();

        for (id, callback) in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(document))).is_err() {
                warn!(subscription = id, "Update callback panicked");
            }
        }
    }

    pub fn clear_cache(&self) {
        *self.cache.lock() = None;
    }

    /// Document en cache, même expiré
    pub fn cached(&self) -> Option<RemoteDocument> {
        self.cache.lock().as_ref().map(|c| c.document.clone())
    }

    fn fresh_cached(&self) -> Option<RemoteDocument> {
        self.cache
            .lock()
            .as_ref()
            .filter(|c| c.stored_at.elapsed() < self.cache_ttl)
            .map(|c| c.document.clone())
    }

    fn store_cache(&self, document: RemoteDocument) {
        *self.cache.lock() = Some(CachedDocument {
            document,
            stored_at: Instant::now(),
        });
    }

    /// Vérifie l'accès au gist, sans ré-essai
    pub async fn check_connection(&self) -> ConnectionStatus {
        match self.api.fetch_gist().await {
            Ok(_) => ConnectionStatus {
                success: true,
                message: "Connection OK".to_string(),
            },
            Err(err) => ConnectionStatus {
                success: false,
                message: err.to_string(),
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api.is_configured()
    }
}

/// Builder pour [`RemoteConfigStore`]
#[derive(Debug, Clone)]
pub struct RemoteConfigStoreBuilder {
    client: Option<Client>,
    api_base: String,
    gist_id: Option<String>,
    token: Option<String>,
    file_name: String,
    cache_ttl: Duration,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl Default for RemoteConfigStoreBuilder {
    fn default() -> Self {
        Self {
            client: None,
            api_base: DEFAULT_API_BASE.to_string(),
            gist_id: None,
            token: None,
            file_name: DEFAULT_FILE_NAME.to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl RemoteConfigStoreBuilder {
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

    pub fn gist_id(mut self, gist_id: impl Into<String>) -> Self {
        self.gist_id = Some(gist_id.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
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

    pub fn build(self) -> Result<RemoteConfigStore> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().user_agent(DEFAULT_USER_AGENT).build()?,
        };

        let api = GistApi::new(
            client,
            self.api_base,
            self.gist_id,
            self.token,
            self.file_name,
            self.request_timeout,
        );
        if !api.is_configured() {
            warn!("Gist ID or GitHub token not configured, catalog requests will fail");
        }

        Ok(RemoteConfigStore {
            api,
            retry: self.retry,
            cache_ttl: self.cache_ttl,
            cache: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
        })
    }
}
