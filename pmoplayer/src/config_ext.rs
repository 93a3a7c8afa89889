//! Extension pour intégrer la configuration du lecteur dans pmoconfig
//!
//! Ce module fournit le trait `PlayerConfigExt` qui expose la section
//! `player` de la configuration.

use crate::loader::DEFAULT_SDK_LOAD_TIMEOUT;
use crate::registry::{DEFAULT_MAX_INACTIVE, DEFAULT_SWEEP_INTERVAL};
use crate::session::{DEFAULT_ERROR_DISPLAY, DEFAULT_INACTIVITY_DELAY, DEFAULT_RESTRICTED_REGION};
use anyhow::Result;
use pmoconfig::Config;
use std::time::Duration;

/// Trait d'extension pour la configuration du lecteur
pub trait PlayerConfigExt {
    /// Délai d'inactivité après une pause avant le retour à la miniature
    fn get_player_inactivity_delay(&self) -> Result<Duration>;

    /// Durée d'affichage d'une erreur de lecture
    fn get_player_error_display(&self) -> Result<Duration>;

    /// Inactivité maximale d'un lecteur enregistré
    fn get_player_max_inactive(&self) -> Result<Duration>;

    /// Intervalle du balayage du registre
    fn get_player_cleanup_interval(&self) -> Result<Duration>;

    /// Délai de chargement du SDK
    fn get_player_sdk_load_timeout(&self) -> Result<Duration>;

    /// Préfixes de locale pour lesquels une lecture refusée est attribuée à un géoblocage
    fn get_player_restricted_regions(&self) -> Result<Vec<String>>;
}

impl PlayerConfigExt for Config {
    fn get_player_inactivity_delay(&self) -> Result<Duration> {
        self.get_duration_ms(&["player", "inactivity_delay_ms"], DEFAULT_INACTIVITY_DELAY)
    }

    fn get_player_error_display(&self) -> Result<Duration> {
        self.get_duration_ms(&["player", "error_display_ms"], DEFAULT_ERROR_DISPLAY)
    }

    fn get_player_max_inactive(&self) -> Result<Duration> {
        self.get_duration_secs(&["player", "max_inactive_secs"], DEFAULT_MAX_INACTIVE)
    }

    fn get_player_cleanup_interval(&self) -> Result<Duration> {
        self.get_duration_secs(&["player", "cleanup_interval_secs"], DEFAULT_SWEEP_INTERVAL)
    }

    fn get_player_sdk_load_timeout(&self) -> Result<Duration> {
        self.get_duration_ms(&["player", "sdk_load_timeout_ms"], DEFAULT_SDK_LOAD_TIMEOUT)
    }

    fn get_player_restricted_regions(&self) -> Result<Vec<String>> {
        let regions = self.get_string_list(&["player", "restricted_regions"])?;
        if regions.is_empty() {
            Ok(vec![DEFAULT_RESTRICTED_REGION.to_string()])
        } else {
            Ok(regions)
        }
    }
}
