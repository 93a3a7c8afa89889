//! Extension pour intégrer la configuration YouTube dans pmoconfig
//!
//! Ce module fournit le trait `YoutubeConfigExt` qui expose la section
//! `sources.youtube` de la configuration.
//!
//! # Exemple
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmoyoutube::YoutubeConfigExt;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = get_config();
//! if config.get_youtube_api_key()?.is_none() {
//!     println!("Set sources.youtube.api_key first");
//! }
//! # Ok(())
//! # }
//! ```

use crate::api::DEFAULT_API_BASE;
use crate::cache::{DEFAULT_CACHE_SIZE, DEFAULT_CACHE_TTL};
use crate::fetcher::{DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_BATCH_SIZE, DEFAULT_REQUEST_TIMEOUT};
use crate::normalize::DEFAULT_MAX_DESCRIPTION_LENGTH;
use anyhow::Result;
use pmoconfig::Config;
use pmoutils::RetryPolicy;
use pmoutils::retry::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use std::time::Duration;

const SECTION: [&str; 2] = ["sources", "youtube"];

fn key<'a>(path: &[&'a str]) -> Vec<&'a str> {
    SECTION.iter().copied().chain(path.iter().copied()).collect()
}

/// Trait d'extension pour la configuration YouTube
pub trait YoutubeConfigExt {
    /// Clé d'API YouTube Data v3 (`None` si vide)
    fn get_youtube_api_key(&self) -> Result<Option<String>>;

    /// Définit la clé d'API
    fn set_youtube_api_key(&self, key: &str) -> Result<()>;

    /// URL de base de l'API
    fn get_youtube_api_base(&self) -> Result<String>;

    /// Taille maximale d'un lot
    fn get_youtube_max_batch_size(&self) -> Result<usize>;

    /// Nombre maximal d'entrées du cache
    fn get_youtube_cache_max_entries(&self) -> Result<usize>;

    /// Durée de vie des entrées du cache
    fn get_youtube_cache_ttl(&self) -> Result<Duration>;

    /// Intervalle du nettoyage périodique du cache
    fn get_youtube_cache_cleanup_interval(&self) -> Result<Duration>;

    fn get_youtube_request_timeout(&self) -> Result<Duration>;

    fn get_youtube_max_description_length(&self) -> Result<usize>;

    /// Politique de ré-essai (`retry.attempts`, `retry.base_delay_ms`)
    fn get_youtube_retry_policy(&self) -> Result<RetryPolicy>;
}

impl YoutubeConfigExt for Config {
    fn get_youtube_api_key(&self) -> Result<Option<String>> {
        self.get_string(&key(&["api_key"]))
    }

    fn set_youtube_api_key(&self, api_key: &str) -> Result<()> {
        self.set_string(&key(&["api_key"]), api_key)
    }

    fn get_youtube_api_base(&self) -> Result<String> {
        Ok(self
            .get_string(&key(&["api_base"]))?
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()))
    }

    fn get_youtube_max_batch_size(&self) -> Result<usize> {
        Ok(self.get_u64(&key(&["max_batch_size"]), DEFAULT_MAX_BATCH_SIZE as u64)? as usize)
    }

    fn get_youtube_cache_max_entries(&self) -> Result<usize> {
        Ok(self.get_u64(&key(&["cache", "max_entries"]), DEFAULT_CACHE_SIZE as u64)? as usize)
    }

    fn get_youtube_cache_ttl(&self) -> Result<Duration> {
        self.get_duration_secs(&key(&["cache", "ttl_secs"]), DEFAULT_CACHE_TTL)
    }

    fn get_youtube_cache_cleanup_interval(&self) -> Result<Duration> {
        self.get_duration_secs(
            &key(&["cache", "cleanup_interval_secs"]),
            DEFAULT_CLEANUP_INTERVAL,
        )
    }

    fn get_youtube_request_timeout(&self) -> Result<Duration> {
        self.get_duration_ms(&key(&["request_timeout_ms"]), DEFAULT_REQUEST_TIMEOUT)
    }

    fn get_youtube_max_description_length(&self) -> Result<usize> {
        Ok(self.get_u64(
            &key(&["max_description_length"]),
            DEFAULT_MAX_DESCRIPTION_LENGTH as u64,
        )? as usize)
    }

    fn get_youtube_retry_policy(&self) -> Result<RetryPolicy> {
        let attempts = self.get_u64(&key(&["retry", "attempts"]), DEFAULT_RETRY_ATTEMPTS as u64)?;
        let delay = self.get_duration_ms(&key(&["retry", "base_delay_ms"]), DEFAULT_RETRY_DELAY)?;
        Ok(RetryPolicy::new(attempts as u32, delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_embedded_config() {
        let config = Config::embedded();
        assert_eq!(config.get_youtube_api_key().unwrap(), None);
        assert_eq!(config.get_youtube_max_batch_size().unwrap(), 50);
        assert_eq!(config.get_youtube_cache_ttl().unwrap(), Duration::from_secs(1800));
        assert_eq!(
            config.get_youtube_retry_policy().unwrap(),
            RetryPolicy::new(2, Duration::from_millis(1000))
        );
    }
}
