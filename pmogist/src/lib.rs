//! # pmogist - Catalogue éditorial stocké dans un gist GitHub
//!
//! Le catalogue de vidéos (catégories, sous-catégories, vidéos) est un fichier
//! JSON `videos-config.json` d'un gist. Cette crate le lit avec un cache,
//! le réécrit en entier à chaque édition et applique les règles d'identifiants
//! (génération par groupe de sœurs, unicité sur tout l'arbre).
//!
//! ## Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmogist::RemoteConfigStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = RemoteConfigStore::from_config(&get_config())?;
//!     let document = store.get_config(true).await?;
//!     for category in &document.categories {
//!         println!("{}", category.id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config_ext;
pub mod document;
pub mod error;
pub mod store;

pub use api::{GistApi, GistFile, GistResponse};
pub use config_ext::GistConfigExt;
pub use document::{Category, CategoryContent, RemoteDocument, Subcategory, VideoEntry};
pub use error::{GistError, Result};
pub use store::{ConnectionStatus, RemoteConfigStore, RemoteConfigStoreBuilder, SubscriptionId};
