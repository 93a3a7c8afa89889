//! Chargement unique et partagé du SDK
//!
//! Tous les appels concurrents à [`SdkLoader::ensure_loaded`] pendant un
//! chargement attendent la même opération. Un échec (ou un dépassement du
//! délai) libère le verrou de chargement pour qu'un appel ultérieur réessaie.

use crate::error::{PlayerError, Result};
use crate::sdk::WidgetSdk;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Délai par défaut de chargement du SDK
pub const DEFAULT_SDK_LOAD_TIMEOUT: Duration = Duration::from_millis(10_000);

type LoadFuture = Shared<BoxFuture<'static, Result<()>>>;

pub struct SdkLoader {
    sdk: Arc<dyn WidgetSdk>,
    timeout: Duration,
    loaded: AtomicBool,
    pending: Mutex<Option<LoadFuture>>,
}

impl SdkLoader {
    pub fn new(sdk: Arc<dyn WidgetSdk>, timeout: Duration) -> Self {
        Self {
            sdk,
            timeout,
            loaded: AtomicBool::new(false),
            pending: Mutex::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Attend que le SDK soit disponible, en le chargeant au besoin
    pub async fn ensure_loaded(&self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        if self.sdk.is_available() {
            debug!("Widget SDK already available");
            self.loaded.store(true, Ordering::SeqCst);
            return Ok(());
        }

        let load = {
            let mut pending = self.pending.lock();
            match pending.as_ref() {
                Some(load) => load.clone(),
                None => {
                    let load = self.start_load();
                    *pending = Some(load.clone());
                    load
                }
            }
        };

        let result = load.clone().await;
        match &result {
            Ok(()) => {
                self.loaded.store(true, Ordering::SeqCst);
            }
            Err(err) => {
                let mut pending = self.pending.lock();
                if pending.as_ref().is_some_and(|current| current.ptr_eq(&load)) {
                    *pending = None;
                }
                warn!("Widget SDK load failed: {}", err);
            }
        }
        result
    }

    fn start_load(&self) -> LoadFuture {
        let sdk = self.sdk.clone();
        let timeout = self.timeout;
        info!("📦 Loading widget SDK");

        async move {
            match tokio::time::timeout(timeout, sdk.load()).await {
                Ok(result) => result,
                Err(_) => Err(PlayerError::SdkLoadTimeout(timeout.as_millis() as u64)),
            }
        }
        .boxed()
        .shared()
    }

    /// Oublie l'état de chargement
    pub fn reset(&self) {
        self.loaded.store(false, Ordering::SeqCst);
        *self.pending.lock() = None;
    }
}
