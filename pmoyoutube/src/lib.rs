//! # pmoyoutube - Métadonnées YouTube pour PMOVideos
//!
//! Cette crate récupère les métadonnées des vidéos du catalogue auprès de
//! l'API YouTube Data v3, par lots, avec :
//!
//! - un cache LRU borné à expiration ([`ResultCache`]) indexé par lot
//! - l'annulation coopérative et le suivi des requêtes ([`RequestCoordinator`])
//! - un ré-essai à backoff exponentiel partagé ([`pmoutils::RetryPolicy`])
//! - la normalisation des réponses et des placeholders pour les vidéos absentes
//!
//! ## Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoyoutube::{ItemReference, MetadataFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = MetadataFetcher::from_config(&get_config())?;
//!     let videos = fetcher
//!         .fetch_batch(&[ItemReference::new("intro_1", "dQw4w9WgXcQ")], None)
//!         .await?;
//!     println!("{:#?}", videos);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config_ext;
pub mod coordinator;
pub mod error;
pub mod fetcher;
pub mod models;
pub mod normalize;

pub use api::YoutubeApi;
pub use cache::{CacheStats, ResultCache, composite_key};
pub use config_ext::YoutubeConfigExt;
pub use coordinator::RequestCoordinator;
pub use error::{Result, YoutubeError};
pub use fetcher::{FetcherStats, MetadataFetcher, MetadataFetcherBuilder};
pub use models::{ItemReference, NormalizedMetadata, Stat, Thumbnail, Thumbnails};
pub use normalize::Normalizer;
