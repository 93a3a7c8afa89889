//! Cycle de vie d'une session de lecture
//!
//! Une session part de la miniature (`Thumbnail`), passe en `Loading` à
//! l'activation, puis suit les événements du lecteur (`Idle`, `Playing`).
//! Une seule session à la fois est hors de {Thumbnail, Destroyed, Error} :
//! l'activation revendique le [`SessionSlot`] du [`SessionManager`], ce qui
//! ramène l'occupant précédent à sa miniature avant que la nouvelle session
//! n'entre en `Loading`.
//!
//! Chaque changement d'état est publié sur un canal broadcast
//! ([`SessionManager::subscribe`]).
//!
//! Les minuteries (inactivité, effacement d'erreur) et la pompe d'événements
//! sont des tâches tokio qui ne tiennent qu'une référence faible sur la
//! session ; elles portent un numéro de génération pour ignorer les
//! déclenchements périmés.

use crate::config_ext::PlayerConfigExt;
use crate::error::{PlayerError, Result};
use crate::sdk::{PlaybackState, PlayerHandle, PlayerVar, ProviderEvent};
use crate::service::PlayerService;
use crate::slot::{SessionId, SessionSlot};
use parking_lot::Mutex;
use pmoconfig::Config;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Délai d'inactivité par défaut après une pause
pub const DEFAULT_INACTIVITY_DELAY: Duration = Duration::from_millis(10_000);

/// Durée d'affichage par défaut d'une erreur
pub const DEFAULT_ERROR_DISPLAY: Duration = Duration::from_millis(5_000);

/// Région restreinte par défaut pour l'heuristique de géoblocage
pub const DEFAULT_RESTRICTED_REGION: &str = "ru";

const TRANSITION_CHANNEL_CAPACITY: usize = 256;

/// État d'une session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SessionState {
    Thumbnail,
    Loading,
    Idle,
    Playing,
    Error,
    Destroyed,
}

impl SessionState {
    /// `true` pour les états qui occupent l'emplacement global
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Loading | Self::Idle | Self::Playing)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Thumbnail => "thumbnail",
            Self::Loading => "loading",
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Error => "error",
            Self::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Catégorie d'erreur de lecture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    NotFound,
    EmbedDisallowed,
    Geoblocked,
    Html5Error,
    InvalidParameter,
    Network,
    Unknown,
}

impl PlaybackErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::EmbedDisallowed => "embed_disallowed",
            Self::Geoblocked => "geoblocked",
            Self::Html5Error => "html5_error",
            Self::InvalidParameter => "invalid_parameter",
            Self::Network => "network",
            Self::Unknown => "unknown",
        }
    }

    /// Les vidéos introuvables ou non intégrables ne se répareront pas seules
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::NotFound | Self::EmbedDisallowed | Self::Geoblocked
        )
    }

    /// Clé de traduction du message affiché
    pub fn message_key(&self) -> String {
        format!("player.errors.{}", self.as_str())
    }
}

/// Erreur de lecture classée
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackError {
    pub kind: PlaybackErrorKind,
    /// Code brut du lecteur, absent pour les échecs d'initialisation
    pub code: Option<i32>,
    pub retryable: bool,
    pub message_key: String,
}

impl PlaybackError {
    pub fn new(kind: PlaybackErrorKind, code: Option<i32>) -> Self {
        Self {
            kind,
            code,
            retryable: kind.is_retryable(),
            message_key: kind.message_key(),
        }
    }

    /// Classe un code d'erreur du lecteur
    ///
    /// Un refus d'intégration est considéré comme un géoblocage quand la
    /// locale de la session correspond à une région restreinte.
    pub fn from_provider_code(code: i32, locale: &str, restricted_regions: &[String]) -> Self {
        let kind = match code {
            2 => PlaybackErrorKind::InvalidParameter,
            5 => PlaybackErrorKind::Html5Error,
            100 | 105 => PlaybackErrorKind::NotFound,
            101 | 150 | 153 if locale_in_regions(locale, restricted_regions) => {
                PlaybackErrorKind::Geoblocked
            }
            101 | 150 | 153 => PlaybackErrorKind::EmbedDisallowed,
            _ => PlaybackErrorKind::Unknown,
        };
        Self::new(kind, Some(code))
    }

    /// Classe un échec d'initialisation du lecteur
    pub fn from_init_failure(err: &PlayerError) -> Self {
        if err.is_sdk_load_error() {
            Self::new(PlaybackErrorKind::Network, None)
        } else {
            Self::new(PlaybackErrorKind::Unknown, None)
        }
    }
}

fn locale_in_regions(locale: &str, regions: &[String]) -> bool {
    let locale = locale.to_ascii_lowercase();
    regions.iter().any(|region| {
        let region = region.to_ascii_lowercase();
        locale == region
            || locale
                .strip_prefix(region.as_str())
                .is_some_and(|rest| rest.starts_with('-') || rest.starts_with('_'))
    })
}

/// Réglages des sessions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub inactivity_delay: Duration,
    pub error_display: Duration,
    pub restricted_regions: Vec<String>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            inactivity_delay: DEFAULT_INACTIVITY_DELAY,
            error_display: DEFAULT_ERROR_DISPLAY,
            restricted_regions: vec![DEFAULT_RESTRICTED_REGION.to_string()],
        }
    }
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            inactivity_delay: config.get_player_inactivity_delay()?,
            error_display: config.get_player_error_display()?,
            restricted_regions: config.get_player_restricted_regions()?,
        })
    }
}

/// Changement d'état publié par une session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionEvent {
    pub session: SessionId,
    pub from: SessionState,
    pub to: SessionState,
}

/// Propriétaire de l'emplacement global et du service de lecteurs
///
/// Une instance par processus en production ; les tests en construisent
/// autant qu'ils veulent.
pub struct SessionManager {
    slot: SessionSlot,
    service: Arc<PlayerService>,
    settings: SessionSettings,
    transitions: broadcast::Sender<TransitionEvent>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl SessionManager {
    pub fn new(service: Arc<PlayerService>, settings: SessionSettings) -> Arc<Self> {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Arc::new(Self {
            slot: SessionSlot::new(),
            service,
            settings,
            transitions,
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn from_config(service: Arc<PlayerService>, config: &Config) -> anyhow::Result<Arc<Self>> {
        Ok(Self::new(service, SessionSettings::from_config(config)?))
    }

    /// Crée une session en état `Thumbnail`
    pub fn create_session(
        self: &Arc<Self>,
        item_id: impl Into<String>,
        locale: impl Into<String>,
    ) -> PlayerSession {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        PlayerSession {
            inner: Arc::new(SessionInner {
                id,
                item_id: item_id.into(),
                locale: locale.into(),
                manager: self.clone(),
                core: Mutex::new(SessionCore::new()),
            }),
        }
    }

    /// Abonnement aux changements d'état de toutes les sessions
    pub fn subscribe(&self) -> broadcast::Receiver<TransitionEvent> {
        self.transitions.subscribe()
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.slot.active_session()
    }

    pub fn service(&self) -> &Arc<PlayerService> {
        &self.service
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Ramène la session active à sa miniature et détruit tous les lecteurs
    ///
    /// À appeler quand la page est masquée ou que la catégorie affichée change.
    pub fn preempt_active(&self) -> Option<SessionId> {
        let preempted = self.slot.preempt_current();
        let removed = self.service.cleanup();
        if preempted.is_some() || removed > 0 {
            info!(session = ?preempted, removed, "⏹️ Active playback preempted");
        }
        preempted
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Arrête tout ; les activations suivantes échouent
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.preempt_active();
        self.service.destroy();
        info!("🛑 Session manager shut down");
    }

    fn publish(&self, event: TransitionEvent) {
        // Aucun abonné n'est une situation normale
        let _ = self.transitions.send(event);
    }
}

struct SessionCore {
    state: SessionState,
    /// Incrémentée à chaque activation et chaque teardown
    generation: u64,
    /// Incrémentée à chaque armement ou annulation de la minuterie d'inactivité
    timer_epoch: u64,
    container_id: Option<String>,
    handle: Option<Arc<dyn PlayerHandle>>,
    registered: bool,
    ready_pending: bool,
    hovered: bool,
    visible: bool,
    last_error: Option<PlaybackError>,
    inactivity_timer: Option<JoinHandle<()>>,
    error_timer: Option<JoinHandle<()>>,
    event_pump: Option<JoinHandle<()>>,
}

impl SessionCore {
    fn new() -> Self {
        Self {
            state: SessionState::Thumbnail,
            generation: 0,
            timer_epoch: 0,
            container_id: None,
            handle: None,
            registered: false,
            ready_pending: false,
            hovered: false,
            visible: true,
            last_error: None,
            inactivity_timer: None,
            error_timer: None,
            event_pump: None,
        }
    }

    fn cancel_inactivity(&mut self) {
        self.timer_epoch += 1;
        if let Some(timer) = self.inactivity_timer.take() {
            timer.abort();
        }
    }
}

/// Libère minuteries, pompe d'événements et lecteur
fn release_resources(manager: &SessionManager, core: &mut SessionCore) {
    core.cancel_inactivity();
    if let Some(timer) = core.error_timer.take() {
        timer.abort();
    }
    if let Some(pump) = core.event_pump.take() {
        pump.abort();
    }

    let handle = core.handle.take();
    if let Some(container_id) = core.container_id.take() {
        if core.registered {
            manager.service.destroy_player(&container_id);
        } else if let Some(handle) = handle {
            if let Err(err) = handle.destroy() {
                warn!(container_id = %container_id, "Error destroying player: {}", err);
            }
        }
    }
    core.registered = false;
    core.ready_pending = false;
}

struct SessionInner {
    id: SessionId,
    item_id: String,
    locale: String,
    manager: Arc<SessionManager>,
    core: Mutex<SessionCore>,
}

impl SessionInner {
    fn set_state(&self, core: &mut SessionCore, to: SessionState) {
        let from = core.state;
        if from == to {
            return;
        }
        core.state = to;
        debug!(session = self.id, %from, %to, "Session transition");
        self.manager.publish(TransitionEvent {
            session: self.id,
            from,
            to,
        });
    }

    /// Teardown complet vers la miniature
    fn return_to_thumbnail(&self, core: &mut SessionCore, reason: &str) {
        if core.state == SessionState::Destroyed {
            return;
        }
        if let Some(handle) = core.handle.as_ref() {
            if let Err(err) = handle.stop() {
                warn!(session = self.id, "Error stopping playback: {}", err);
            }
        }
        release_resources(&self.manager, core);
        core.generation += 1;
        core.last_error = None;
        self.set_state(core, SessionState::Thumbnail);
        self.manager.slot.release_if(self.id);
        debug!(session = self.id, reason, "Session returned to thumbnail");
    }

    fn on_ready(&self, core: &mut SessionCore) {
        if let (Some(container_id), Some(handle)) = (core.container_id.clone(), core.handle.clone())
        {
            core.registered = self
                .manager
                .service
                .register_player(&container_id, &self.item_id, handle);
        }
        self.set_state(core, SessionState::Idle);
    }

    fn enter_error(self: &Arc<Self>, core: &mut SessionCore, error: PlaybackError) {
        core.cancel_inactivity();
        warn!(
            session = self.id,
            kind = error.kind.as_str(),
            code = ?error.code,
            "Playback error"
        );
        core.last_error = Some(error);
        self.set_state(core, SessionState::Error);

        if let Some(timer) = core.error_timer.take() {
            timer.abort();
        }
        let weak = Arc::downgrade(self);
        let generation = core.generation;
        let delay = self.manager.settings.error_display;
        core.error_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_error_display_elapsed(generation);
            }
        }));
    }

    fn on_error_display_elapsed(&self, generation: u64) {
        let mut core = self.core.lock();
        if core.generation != generation || core.state != SessionState::Error {
            return;
        }
        core.error_timer = None;
        self.return_to_thumbnail(&mut core, "error cleared");
    }

    fn arm_inactivity(self: &Arc<Self>, core: &mut SessionCore) {
        core.cancel_inactivity();
        let epoch = core.timer_epoch;
        let weak = Arc::downgrade(self);
        let delay = self.manager.settings.inactivity_delay;
        core.inactivity_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_inactivity_elapsed(epoch);
            }
        }));
    }

    fn on_inactivity_elapsed(&self, epoch: u64) {
        let mut core = self.core.lock();
        if core.timer_epoch != epoch {
            return;
        }
        core.inactivity_timer = None;
        if core.state == SessionState::Idle && !core.hovered {
            self.return_to_thumbnail(&mut core, "inactivity");
        }
    }

    fn spawn_event_pump(
        self: &Arc<Self>,
        generation: u64,
        mut events: mpsc::UnboundedReceiver<ProviderEvent>,
    ) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else { break };
                inner.handle_event(Some(generation), event);
            }
        })
    }

    fn handle_event(self: &Arc<Self>, generation: Option<u64>, event: ProviderEvent) {
        let mut core = self.core.lock();
        if generation.is_some_and(|g| g != core.generation) {
            return;
        }

        use SessionState::*;
        match (core.state, event) {
            (Loading, ProviderEvent::Ready) => {
                if core.handle.is_some() {
                    self.on_ready(&mut core);
                } else {
                    core.ready_pending = true;
                }
            }
            (Idle, ProviderEvent::StateChanged(PlaybackState::Playing)) => {
                core.cancel_inactivity();
                self.set_state(&mut core, Playing);
            }
            (Playing, ProviderEvent::StateChanged(PlaybackState::Paused)) => {
                self.set_state(&mut core, Idle);
                self.arm_inactivity(&mut core);
            }
            (Loading | Idle | Playing, ProviderEvent::StateChanged(PlaybackState::Ended)) => {
                self.return_to_thumbnail(&mut core, "ended");
            }
            (Loading | Idle | Playing, ProviderEvent::Error(code)) => {
                let error = PlaybackError::from_provider_code(
                    code,
                    &self.locale,
                    &self.manager.settings.restricted_regions,
                );
                self.enter_error(&mut core, error);
            }
            (state, event) => {
                debug!(session = self.id, %state, ?event, "Ignoring provider event");
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        let manager = self.manager.clone();
        let id = self.id;
        let core = self.core.get_mut();
        if core.state != SessionState::Destroyed {
            release_resources(&manager, core);
            manager.slot.release_if(id);
        }
    }
}

/// Session de lecture d'une vidéo
///
/// Clonable : toutes les copies désignent la même session.
#[derive(Clone)]
pub struct PlayerSession {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for PlayerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerSession")
            .field("id", &self.inner.id)
            .field("item_id", &self.inner.item_id)
            .field("state", &self.state())
            .finish()
    }
}

impl PlayerSession {
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn item_id(&self) -> &str {
        &self.inner.item_id
    }

    pub fn state(&self) -> SessionState {
        self.inner.core.lock().state
    }

    pub fn last_error(&self) -> Option<PlaybackError> {
        self.inner.core.lock().last_error.clone()
    }

    /// Conteneur du lecteur courant
    pub fn container_id(&self) -> Option<String> {
        self.inner.core.lock().container_id.clone()
    }

    pub fn is_hovered(&self) -> bool {
        self.inner.core.lock().hovered
    }

    pub fn is_visible(&self) -> bool {
        self.inner.core.lock().visible
    }

    /// Activation par l'utilisateur
    ///
    /// Préempte la session active, revendique l'emplacement global, passe en
    /// `Loading` puis attend la création du lecteur. Un échec d'initialisation
    /// fait passer la session en `Error` et libère l'emplacement.
    pub async fn activate(&self) -> Result<()> {
        let inner = &self.inner;
        let manager = &inner.manager;

        if manager.is_shut_down() {
            return Err(PlayerError::ServiceDestroyed);
        }
        {
            let core = inner.core.lock();
            if core.state == SessionState::Destroyed {
                return Err(PlayerError::SessionDestroyed);
            }
            if core.state.is_active() {
                return Ok(());
            }
        }

        let weak = Arc::downgrade(inner);
        manager.slot.claim(
            inner.id,
            Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut core = inner.core.lock();
                    inner.return_to_thumbnail(&mut core, "preempted");
                }
            }),
        );

        let (generation, container_id, events) = {
            let mut core = inner.core.lock();
            if core.state == SessionState::Destroyed {
                manager.slot.release_if(inner.id);
                return Err(PlayerError::SessionDestroyed);
            }
            release_resources(manager, &mut core);
            core.last_error = None;
            core.generation += 1;
            let container_id = format!(
                "pmovideos-player-{}-{}-{}",
                inner.item_id, inner.id, core.generation
            );
            core.container_id = Some(container_id.clone());
            inner.set_state(&mut core, SessionState::Loading);

            let (tx, rx) = mpsc::unbounded_channel();
            core.event_pump = Some(inner.spawn_event_pump(core.generation, rx));
            (core.generation, container_id, tx)
        };

        info!(session = inner.id, item_id = %inner.item_id, "🎬 Activating playback");
        let result = manager
            .service
            .create_player(
                &container_id,
                &inner.item_id,
                &[PlayerVar::Autoplay(true)],
                events,
            )
            .await;

        let mut core = inner.core.lock();
        if core.generation != generation || core.state != SessionState::Loading {
            if let Ok(handle) = result {
                if let Err(err) = handle.destroy() {
                    warn!(container_id = %container_id, "Error destroying player: {}", err);
                }
            }
            debug!(session = inner.id, "Session left loading before the player was created");
            return Ok(());
        }

        match result {
            Ok(handle) => {
                core.handle = Some(handle);
                if core.ready_pending {
                    core.ready_pending = false;
                    inner.on_ready(&mut core);
                }
                Ok(())
            }
            Err(err) => {
                release_resources(manager, &mut core);
                inner.enter_error(&mut core, PlaybackError::from_init_failure(&err));
                manager.slot.release_if(inner.id);
                Err(err)
            }
        }
    }

    /// Injecte un événement du lecteur courant
    pub fn handle_provider_event(&self, event: ProviderEvent) {
        self.inner.handle_event(None, event);
    }

    /// Survol : suspend la minuterie d'inactivité, la réarme à la sortie
    pub fn set_hovered(&self, hovered: bool) {
        let mut core = self.inner.core.lock();
        core.hovered = hovered;
        if hovered {
            core.cancel_inactivity();
        } else if core.state == SessionState::Idle {
            self.inner.arm_inactivity(&mut core);
        }
    }

    /// Visibilité : une session active qui sort de l'écran est mise en pause
    pub fn set_visible(&self, visible: bool) {
        let mut core = self.inner.core.lock();
        core.visible = visible;
        if visible
            || core.state != SessionState::Playing
            || self.inner.manager.active_session() != Some(self.inner.id)
        {
            return;
        }

        let handle = match (&core.container_id, core.registered) {
            (Some(container_id), true) => self.inner.manager.service.get_player(container_id),
            _ => core.handle.clone(),
        };
        if let Some(handle) = handle {
            if let Err(err) = handle.pause() {
                warn!(session = self.inner.id, "Error pausing video: {}", err);
            }
        }
    }

    /// Teardown explicite, idempotent
    pub fn destroy(&self) {
        let inner = &self.inner;
        let mut core = inner.core.lock();
        if core.state == SessionState::Destroyed {
            return;
        }
        release_resources(&inner.manager, &mut core);
        core.generation += 1;
        core.last_error = None;
        inner.set_state(&mut core, SessionState::Destroyed);
        inner.manager.slot.release_if(inner.id);
        debug!(session = inner.id, "Session destroyed");
    }
}
