//! # pmoplayer - Lecteur vidéo intégré pour PMOVideos
//!
//! Cette crate gère la vie des lecteurs du SDK intégrable :
//!
//! - [`SdkLoader`] : chargement unique et partagé du script du SDK
//! - [`ResourceRegistry`] : suivi des lecteurs créés et balayage des inactifs
//! - [`PlayerService`] : création, enregistrement, destruction, métriques
//! - [`SessionManager`] / [`PlayerSession`] : machine d'états par vidéo avec
//!   une seule session active à la fois dans le processus
//!
//! Le SDK lui-même est un collaborateur externe décrit par le trait
//! [`WidgetSdk`] ; ses callbacks arrivent sur un canal de [`ProviderEvent`].
//!
//! ## Exemple
//!
//! ```ignore
//! use pmoplayer::{PlayerService, SessionManager, SessionSettings};
//! use std::sync::Arc;
//!
//! let service = Arc::new(PlayerService::new(sdk));
//! let manager = SessionManager::new(service, SessionSettings::default());
//!
//! let session = manager.create_session("dQw4w9WgXcQ", "fr");
//! session.activate().await?;
//! session.set_hovered(true);
//! ```

pub mod config_ext;
pub mod error;
pub mod loader;
pub mod registry;
pub mod sdk;
pub mod service;
pub mod session;
pub mod slot;

pub use config_ext::PlayerConfigExt;
pub use error::{PlayerError, Result};
pub use loader::SdkLoader;
pub use registry::{RegistryMetrics, ResourceRegistry};
pub use sdk::{
    PlaybackState, PlayerHandle, PlayerVar, PlayerVars, ProviderEvent, ProviderEventSender,
    WidgetSdk,
};
pub use service::{PlayerMetrics, PlayerService};
pub use session::{
    PlaybackError, PlaybackErrorKind, PlayerSession, SessionManager, SessionSettings,
    SessionState, TransitionEvent,
};
pub use slot::{SessionId, SessionSlot};
