//! Registre des lecteurs créés
//!
//! Chaque lecture (`get`, `has`) ou écriture rafraîchit la date de dernière
//! activité de l'enregistrement. Le balayage périodique supprime ceux qui sont
//! restés inactifs plus de `max_inactive`.

use crate::sdk::PlayerHandle;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Inactivité maximale par défaut (10 minutes)
pub const DEFAULT_MAX_INACTIVE: Duration = Duration::from_secs(10 * 60);

/// Intervalle par défaut du balayage (5 minutes)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

struct RegistryRecord {
    handle: Arc<dyn PlayerHandle>,
    item_id: String,
    created_at: Instant,
    last_activity_at: Instant,
}

/// Compteurs du registre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RegistryMetrics {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
}

pub struct ResourceRegistry {
    records: Mutex<HashMap<String, RegistryRecord>>,
    max_inactive: Duration,
    destroyed: AtomicBool,
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_INACTIVE)
    }
}

impl ResourceRegistry {
    pub fn new(max_inactive: Duration) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            max_inactive,
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn max_inactive(&self) -> Duration {
        self.max_inactive
    }

    /// Enregistre un lecteur ; un enregistrement existant est remplacé
    pub fn register(&self, id: &str, handle: Arc<dyn PlayerHandle>, item_id: &str) -> bool {
        if self.is_destroyed() {
            Self::destroy_handle(id, &handle);
            return false;
        }

        let now = Instant::now();
        let previous = self.records.lock().insert(
            id.to_string(),
            RegistryRecord {
                handle,
                item_id: item_id.to_string(),
                created_at: now,
                last_activity_at: now,
            },
        );

        if let Some(previous) = previous {
            warn!(resource_id = %id, "Replacing an already registered player");
            Self::destroy_handle(id, &previous.handle);
        }
        debug!(resource_id = %id, item_id = %item_id, "Player registered");
        true
    }

    /// Retourne le lecteur et rafraîchit son activité
    pub fn get(&self, id: &str) -> Option<Arc<dyn PlayerHandle>> {
        if self.is_destroyed() {
            return None;
        }
        let mut records = self.records.lock();
        let record = records.get_mut(id)?;
        record.last_activity_at = Instant::now();
        Some(record.handle.clone())
    }

    /// Vérifie la présence d'un lecteur et rafraîchit son activité
    pub fn has(&self, id: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }
        match self.records.lock().get_mut(id) {
            Some(record) => {
                record.last_activity_at = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Identifiant de la vidéo associée, sans effet sur l'activité
    pub fn item_id(&self, id: &str) -> Option<String> {
        self.records.lock().get(id).map(|r| r.item_id.clone())
    }

    /// Âge de l'enregistrement depuis sa création
    pub fn age(&self, id: &str) -> Option<Duration> {
        self.records.lock().get(id).map(|r| r.created_at.elapsed())
    }

    /// Détruit le lecteur puis supprime l'enregistrement
    ///
    /// Les erreurs de destruction sont journalisées, jamais propagées.
    pub fn remove(&self, id: &str) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let record = self.records.lock().remove(id);
        match record {
            Some(record) => {
                Self::destroy_handle(id, &record.handle);
                true
            }
            None => false,
        }
    }

    /// Supprime tous les lecteurs et retourne leur nombre
    pub fn remove_all(&self) -> usize {
        let drained: Vec<(String, RegistryRecord)> = self.records.lock().drain().collect();
        for (id, record) in &drained {
            Self::destroy_handle(id, &record.handle);
        }
        drained.len()
    }

    /// Supprime les lecteurs inactifs depuis plus de `max_inactive`
    pub fn cleanup_inactive(&self) -> usize {
        if self.is_destroyed() {
            return 0;
        }

        let now = Instant::now();
        let stale: Vec<(String, RegistryRecord)> = {
            let mut records = self.records.lock();
            let ids: Vec<String> = records
                .iter()
                .filter(|(_, r)| now.duration_since(r.last_activity_at) > self.max_inactive)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| records.remove(&id).map(|r| (id, r)))
                .collect()
        };

        for (id, record) in &stale {
            Self::destroy_handle(id, &record.handle);
        }
        if !stale.is_empty() {
            info!(removed = stale.len(), "🧹 Removed inactive players");
        }
        stale.len()
    }

    pub fn metrics(&self) -> RegistryMetrics {
        if self.is_destroyed() {
            return RegistryMetrics::default();
        }
        let now = Instant::now();
        let records = self.records.lock();
        let active = records
            .values()
            .filter(|r| now.duration_since(r.last_activity_at) <= self.max_inactive)
            .count();
        RegistryMetrics {
            total: records.len(),
            active,
            inactive: records.len() - active,
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Supprime tous les lecteurs et refuse les nouveaux
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.remove_all();
    }

    /// Lance le balayage périodique des lecteurs inactifs
    ///
    /// La tâche s'arrête sur `shutdown`, ou quand le registre est libéré.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = weak.upgrade() else { break };
                        if registry.is_destroyed() {
                            break;
                        }
                        registry.cleanup_inactive();
                    }
                }
            }
            debug!("Registry sweeper stopped");
        })
    }

    fn destroy_handle(id: &str, handle: &Arc<dyn PlayerHandle>) {
        if let Err(err) = handle.destroy() {
            warn!(resource_id = %id, "Error destroying player: {}", err);
        }
    }
}
