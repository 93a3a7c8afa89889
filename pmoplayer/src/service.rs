//! Service de création et de suivi des lecteurs
//!
//! Regroupe le [`SdkLoader`] et le [`ResourceRegistry`] derrière une API unique
//! et tient les compteurs d'observabilité.

use crate::config_ext::PlayerConfigExt;
use crate::error::{PlayerError, Result};
use crate::loader::{DEFAULT_SDK_LOAD_TIMEOUT, SdkLoader};
use crate::registry::{DEFAULT_MAX_INACTIVE, RegistryMetrics, ResourceRegistry};
use crate::sdk::{PlayerHandle, PlayerVar, PlayerVars, ProviderEventSender, WidgetSdk};
use parking_lot::Mutex;
use pmoconfig::Config;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    players_created: u64,
    players_destroyed: u64,
    errors: u64,
    last_sdk_load_time: Duration,
}

/// Métriques du service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerMetrics {
    pub players_created: u64,
    pub players_destroyed: u64,
    pub errors: u64,
    pub last_sdk_load_ms: u64,
    pub registry: RegistryMetrics,
    pub sdk_loaded: bool,
    pub destroyed: bool,
}

pub struct PlayerService {
    sdk: Arc<dyn WidgetSdk>,
    loader: SdkLoader,
    registry: Arc<ResourceRegistry>,
    default_vars: PlayerVars,
    counters: Mutex<Counters>,
    destroyed: AtomicBool,
}

impl PlayerService {
    pub fn new(sdk: Arc<dyn WidgetSdk>) -> Self {
        Self::with_settings(sdk, DEFAULT_SDK_LOAD_TIMEOUT, DEFAULT_MAX_INACTIVE)
    }

    pub fn with_settings(
        sdk: Arc<dyn WidgetSdk>,
        sdk_load_timeout: Duration,
        max_inactive: Duration,
    ) -> Self {
        Self {
            loader: SdkLoader::new(sdk.clone(), sdk_load_timeout),
            sdk,
            registry: Arc::new(ResourceRegistry::new(max_inactive)),
            default_vars: PlayerVars::default(),
            counters: Mutex::new(Counters::default()),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Construit le service depuis la section `player` de la configuration
    pub fn from_config(sdk: Arc<dyn WidgetSdk>, config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_settings(
            sdk,
            config.get_player_sdk_load_timeout()?,
            config.get_player_max_inactive()?,
        ))
    }

    /// Remplace les paramètres par défaut des lecteurs
    pub fn with_default_vars(mut self, vars: PlayerVars) -> Self {
        self.default_vars = vars;
        self
    }

    /// Crée un lecteur une fois le SDK disponible
    ///
    /// Le lecteur n'est pas encore enregistré : l'appelant l'enregistre via
    /// [`PlayerService::register_player`] quand il est prêt.
    pub async fn create_player(
        &self,
        container_id: &str,
        item_id: &str,
        overrides: &[PlayerVar],
        events: ProviderEventSender,
    ) -> Result<Arc<dyn PlayerHandle>> {
        if self.is_destroyed() {
            return Err(PlayerError::ServiceDestroyed);
        }
        if container_id.is_empty() {
            self.counters.lock().errors += 1;
            return Err(PlayerError::MissingIdentifier("container id"));
        }
        if item_id.is_empty() {
            self.counters.lock().errors += 1;
            return Err(PlayerError::MissingIdentifier("video id"));
        }

        let start = Instant::now();
        if let Err(err) = self.loader.ensure_loaded().await {
            self.counters.lock().errors += 1;
            error!(container_id = %container_id, "Player creation failed: {}", err);
            return Err(err);
        }

        if self.is_destroyed() {
            return Err(PlayerError::ServiceDestroyed);
        }
        self.counters.lock().last_sdk_load_time = start.elapsed();

        let vars = self.default_vars.merged(overrides);
        match self.sdk.create_player(container_id, item_id, &vars, events) {
            Ok(handle) => {
                self.counters.lock().players_created += 1;
                info!(container_id = %container_id, item_id = %item_id, "▶️ Player created");
                Ok(handle)
            }
            Err(err) => {
                self.counters.lock().errors += 1;
                error!(container_id = %container_id, "Player creation failed: {}", err);
                Err(err)
            }
        }
    }

    pub fn register_player(
        &self,
        container_id: &str,
        item_id: &str,
        handle: Arc<dyn PlayerHandle>,
    ) -> bool {
        if self.is_destroyed() {
            if let Err(err) = handle.destroy() {
                warn!(container_id = %container_id, "Error destroying player: {}", err);
            }
            return false;
        }
        self.registry.register(container_id, handle, item_id)
    }

    /// Détruit et désenregistre un lecteur
    pub fn destroy_player(&self, container_id: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let removed = self.registry.remove(container_id);
        if removed {
            self.counters.lock().players_destroyed += 1;
        }
        removed
    }

    pub fn get_player(&self, container_id: &str) -> Option<Arc<dyn PlayerHandle>> {
        if self.is_destroyed() {
            return None;
        }
        self.registry.get(container_id)
    }

    pub fn has_player(&self, container_id: &str) -> bool {
        !self.is_destroyed() && self.registry.has(container_id)
    }

    /// Détruit tous les lecteurs enregistrés
    pub fn cleanup(&self) -> usize {
        if self.is_destroyed() {
            return 0;
        }
        let removed = self.registry.remove_all();
        self.counters.lock().players_destroyed += removed as u64;
        removed
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    pub fn is_sdk_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    /// Lance le balayage périodique du registre
    pub fn spawn_sweeper(&self, interval: Duration, shutdown: CancellationToken) -> JoinHandle<()> {
        self.registry.spawn_sweeper(interval, shutdown)
    }

    pub fn metrics(&self) -> PlayerMetrics {
        let counters = *self.counters.lock();
        PlayerMetrics {
            players_created: counters.players_created,
            players_destroyed: counters.players_destroyed,
            errors: counters.errors,
            last_sdk_load_ms: counters.last_sdk_load_time.as_millis() as u64,
            registry: self.registry.metrics(),
            sdk_loaded: self.loader.is_loaded(),
            destroyed: self.is_destroyed(),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Détruit tous les lecteurs, remet les compteurs à zéro et refuse les nouveaux
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.registry.destroy();
        self.loader.reset();
        *self.counters.lock() = Counters::default();
        info!("🧹 Player service destroyed");
    }
}
