//! Extension pour intégrer la configuration du gist dans pmoconfig
//!
//! Ce module fournit le trait `GistConfigExt` qui expose la section
//! `sources.gist` de la configuration.

use crate::api::{DEFAULT_API_BASE, DEFAULT_FILE_NAME};
use crate::store::{DEFAULT_CACHE_TTL, DEFAULT_REQUEST_TIMEOUT};
use anyhow::Result;
use pmoconfig::Config;
use pmoutils::RetryPolicy;
use pmoutils::retry::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY};
use std::time::Duration;

const SECTION: [&str; 2] = ["sources", "gist"];

fn key<'a>(path: &[&'a str]) -> Vec<&'a str> {
    SECTION.iter().copied().chain(path.iter().copied()).collect()
}

/// Trait d'extension pour la configuration du gist
pub trait GistConfigExt {
    fn get_gist_api_base(&self) -> Result<String>;

    /// Identifiant du gist (`None` si vide)
    fn get_gist_id(&self) -> Result<Option<String>>;

    fn set_gist_id(&self, id: &str) -> Result<()>;

    /// Jeton d'accès GitHub (`None` si vide)
    fn get_gist_token(&self) -> Result<Option<String>>;

    fn set_gist_token(&self, token: &str) -> Result<()>;

    /// Nom du fichier de configuration dans le gist
    fn get_gist_file_name(&self) -> Result<String>;

    fn get_gist_cache_ttl(&self) -> Result<Duration>;

    fn get_gist_request_timeout(&self) -> Result<Duration>;

    fn get_gist_retry_policy(&self) -> Result<RetryPolicy>;
}

impl GistConfigExt for Config {
    fn get_gist_api_base(&self) -> Result<String> {
        Ok(self
            .get_string(&key(&["api_base"]))?
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string()))
    }

    fn get_gist_id(&self) -> Result<Option<String>> {
        self.get_string(&key(&["id"]))
    }

    fn set_gist_id(&self, id: &str) -> Result<()> {
        self.set_string(&key(&["id"]), id)
    }

    fn get_gist_token(&self) -> Result<Option<String>> {
        self.get_string(&key(&["token"]))
    }

    fn set_gist_token(&self, token: &str) -> Result<()> {
        self.set_string(&key(&["token"]), token)
    }

    fn get_gist_file_name(&self) -> Result<String> {
        Ok(self
            .get_string(&key(&["file_name"]))?
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string()))
    }

    fn get_gist_cache_ttl(&self) -> Result<Duration> {
        self.get_duration_secs(&key(&["cache_ttl_secs"]), DEFAULT_CACHE_TTL)
    }

    fn get_gist_request_timeout(&self) -> Result<Duration> {
        self.get_duration_ms(&key(&["request_timeout_ms"]), DEFAULT_REQUEST_TIMEOUT)
    }

    fn get_gist_retry_policy(&self) -> Result<RetryPolicy> {
        let attempts = self.get_u64(&key(&["retry", "attempts"]), DEFAULT_RETRY_ATTEMPTS as u64)?;
        let delay = self.get_duration_ms(&key(&["retry", "base_delay_ms"]), DEFAULT_RETRY_DELAY)?;
        Ok(RetryPolicy::new(attempts as u32, delay))
    }
}
