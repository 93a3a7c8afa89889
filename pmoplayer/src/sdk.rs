//! Interface du SDK de lecteur intégrable
//!
//! Le SDK est un collaborateur externe : ce module ne décrit que ce que les
//! sessions en consomment. Les callbacks du SDK (prêt, changement d'état,
//! erreur) arrivent sur un canal [`ProviderEvent`] explicite.

use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

/// États de lecture rapportés par le lecteur
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PlaybackState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl PlaybackState {
    /// Décode un code d'état numérique du lecteur
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(Self::Unstarted),
            0 => Some(Self::Ended),
            1 => Some(Self::Playing),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            5 => Some(Self::Cued),
            _ => None,
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Unstarted => -1,
            Self::Ended => 0,
            Self::Playing => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Cued => 5,
        }
    }
}

/// Événement émis par un lecteur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEvent {
    Ready,
    StateChanged(PlaybackState),
    /// Code d'erreur brut du lecteur
    Error(i32),
}

/// Extrémité émettrice du canal d'événements d'un lecteur
pub type ProviderEventSender = mpsc::UnboundedSender<ProviderEvent>;

/// Paramètres d'affichage transmis au lecteur
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerVars {
    pub autoplay: bool,
    pub controls: bool,
    pub keyboard: bool,
    pub js_api: bool,
    pub fullscreen: bool,
    /// 3 masque les annotations
    pub iv_load_policy: u8,
    pub modest_branding: bool,
    pub plays_inline: bool,
    pub related_videos: bool,
    pub origin: Option<String>,
}

impl Default for PlayerVars {
    fn default() -> Self {
        Self {
            autoplay: false,
            controls: true,
            keyboard: true,
            js_api: true,
            fullscreen: true,
            iv_load_policy: 3,
            modest_branding: true,
            plays_inline: true,
            related_videos: false,
            origin: None,
        }
    }
}

/// Surcharge ponctuelle d'un paramètre du lecteur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerVar {
    Autoplay(bool),
    Controls(bool),
    Keyboard(bool),
    JsApi(bool),
    Fullscreen(bool),
    IvLoadPolicy(u8),
    ModestBranding(bool),
    PlaysInline(bool),
    RelatedVideos(bool),
    Origin(String),
}

impl PlayerVars {
    /// Applique des surcharges par-dessus ces paramètres
    pub fn merged(&self, overrides: &[PlayerVar]) -> Self {
        let mut vars = self.clone();
        for var in overrides {
            match var.clone() {
                PlayerVar::Autoplay(v) => vars.autoplay = v,
                PlayerVar::Controls(v) => vars.controls = v,
                PlayerVar::Keyboard(v) => vars.keyboard = v,
                PlayerVar::JsApi(v) => vars.js_api = v,
                PlayerVar::Fullscreen(v) => vars.fullscreen = v,
                PlayerVar::IvLoadPolicy(v) => vars.iv_load_policy = v,
                PlayerVar::ModestBranding(v) => vars.modest_branding = v,
                PlayerVar::PlaysInline(v) => vars.plays_inline = v,
                PlayerVar::RelatedVideos(v) => vars.related_videos = v,
                PlayerVar::Origin(v) => vars.origin = Some(v),
            }
        }
        vars
    }
}

/// Lecteur créé par le SDK
pub trait PlayerHandle: Send + Sync {
    /// Arrête la lecture
    fn stop(&self) -> Result<()>;

    /// Met la lecture en pause
    fn pause(&self) -> Result<()>;

    /// Détruit le lecteur et libère son conteneur
    fn destroy(&self) -> Result<()>;
}

/// SDK de lecteur intégrable
#[async_trait]
pub trait WidgetSdk: Send + Sync {
    /// `true` si le SDK est déjà disponible (script chargé par ailleurs)
    fn is_available(&self) -> bool;

    /// Injecte le script du SDK et attend son signal de disponibilité
    async fn load(&self) -> Result<()>;

    /// Construit un lecteur dans `container_id` pour la vidéo `item_id`
    ///
    /// Les callbacks du lecteur sont transmis sur `events`.
    fn create_player(
        &self,
        container_id: &str,
        item_id: &str,
        vars: &PlayerVars,
        events: ProviderEventSender,
    ) -> Result<Arc<dyn PlayerHandle>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_codes() {
        for code in [-1, 0, 1, 2, 3, 5] {
            assert_eq!(PlaybackState::from_code(code).unwrap().code(), code);
        }
        assert_eq!(PlaybackState::from_code(4), None);
    }

    #[test]
    fn test_overrides_keep_defaults() {
        let vars = PlayerVars::default().merged(&[PlayerVar::Autoplay(true)]);
        assert!(vars.autoplay);
        assert!(vars.controls);
        assert_eq!(vars.iv_load_policy, 3);
        assert!(!vars.related_videos);
    }
}
