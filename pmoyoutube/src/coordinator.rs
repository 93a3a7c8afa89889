//! Suivi des requêtes en cours et annulation coopérative
//!
//! Chaque tentative réseau est gardée par trois signaux combinés : le jeton
//! racine du coordinateur (`abort_all`/`destroy`), un jeton externe fourni par
//! l'appelant, et le délai de requête. Le premier qui se déclenche interrompt la
//! tentative.

use crate::error::{Result, YoutubeError};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Coordinateur des requêtes de métadonnées
#[derive(Debug)]
pub struct RequestCoordinator {
    root: Mutex<CancellationToken>,
    pending: Arc<AtomicUsize>,
    destroyed: AtomicBool,
}

impl Default for RequestCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Décrémente le compteur de requêtes en cours à la sortie du scope
struct PendingGuard(Arc<AtomicUsize>);

impl PendingGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl RequestCoordinator {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(CancellationToken::new()),
            pending: Arc::new(AtomicUsize::new(0)),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Jeton enfant de la racine courante, `None` une fois détruit
    pub fn signal(&self) -> Option<CancellationToken> {
        if self.is_destroyed() {
            return None;
        }
        Some(self.root.lock().child_token())
    }

    /// Suit une opération complète (toutes tentatives comprises)
    pub async fn track<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_destroyed() {
            return Err(YoutubeError::Destroyed);
        }
        let _pending = PendingGuard::new(self.pending.clone());
        operation.await
    }

    /// Exécute une tentative sous annulation interne, externe et délai
    pub async fn guard<T, F>(
        &self,
        external: Option<&CancellationToken>,
        timeout: Duration,
        attempt: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let internal = self.signal().ok_or(YoutubeError::Destroyed)?;
        let external = external.cloned().unwrap_or_default();

        if external.is_cancelled() {
            return Err(YoutubeError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = internal.cancelled() => {
                if self.is_destroyed() {
                    Err(YoutubeError::Destroyed)
                } else {
                    Err(YoutubeError::Cancelled)
                }
            }
            _ = external.cancelled() => Err(YoutubeError::Cancelled),
            result = attempt => result,
            _ = tokio::time::sleep(timeout) => Err(YoutubeError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Annule toutes les requêtes en cours ; les suivantes utilisent une nouvelle racine
    pub fn abort_all(&self) {
        if self.is_destroyed() {
            return;
        }
        let mut root = self.root.lock();
        root.cancel();
        *root = CancellationToken::new();
        debug!("Aborted all pending metadata requests");
    }

    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// Annule tout et refuse les nouvelles requêtes
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.root.lock().cancel();
    }
}
