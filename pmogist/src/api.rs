//! Client bas niveau de l'API Gist de GitHub

use crate::error::{GistError, Result};
use parking_lot::Mutex;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, json};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// URL de base par défaut de l'API GitHub
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Nom attendu du fichier de configuration dans le gist
pub const DEFAULT_FILE_NAME: &str = "videos-config.json";

const FILE_PREFIX: &str = "videos-config";
const FILE_SUFFIX: &str = ".json";

/// Fichier d'un gist
#[derive(Debug, Clone, Deserialize)]
pub struct GistFile {
    #[serde(default)]
    pub content: Option<String>,
}

/// Réponse de `GET /gists/{id}`
#[derive(Debug, Clone, Deserialize)]
pub struct GistResponse {
    #[serde(default)]
    pub files: BTreeMap<String, GistFile>,
}

/// Choisit le fichier de configuration parmi ceux du gist
///
/// Le nom exact est préféré, puis le premier nom `videos-config*.json`.
pub fn select_config_file<'a>(
    files: &'a BTreeMap<String, GistFile>,
    expected: &str,
) -> Result<(&'a str, &'a str)> {
    let candidate = files
        .get_key_value(expected)
        .or_else(|| {
            files
                .iter()
                .find(|(name, _)| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
        });

    match candidate {
        Some((name, GistFile { content: Some(content) })) if !content.is_empty() => {
            Ok((name.as_str(), content.as_str()))
        }
        _ => Err(GistError::ConfigFileNotFound {
            available: files.keys().cloned().collect::<Vec<_>>().join(", "),
        }),
    }
}

/// Client de l'API Gist
#[derive(Debug)]
pub struct GistApi {
    client: Client,
    api_base: String,
    gist_id: Option<String>,
    token: Option<String>,
    request_timeout: Duration,
    /// Nom du fichier lu en dernier, réutilisé pour l'écriture
    file_name: Mutex<String>,
}

impl GistApi {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        gist_id: Option<String>,
        token: Option<String>,
        file_name: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            gist_id: gist_id.filter(|id| !id.trim().is_empty()),
            token: token.filter(|token| !token.trim().is_empty()),
            request_timeout,
            file_name: Mutex::new(file_name.into()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.gist_id.is_some() && self.token.is_some()
    }

    pub fn file_name(&self) -> String {
        self.file_name.lock().clone()
    }

    fn request(&self, method: reqwest::Method) -> Result<RequestBuilder> {
        let (Some(gist_id), Some(token)) = (self.gist_id.as_deref(), self.token.as_deref()) else {
            return Err(GistError::Configuration(
                "Gist ID or GitHub token not configured".into(),
            ));
        };

        let url = format!("{}/gists/{}", self.api_base, gist_id);
        debug!(url = %url, method = %method, "Gist request");

        Ok(self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github.v3+json")
            .bearer_auth(token)
            .timeout(self.request_timeout))
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                GistError::Timeout(self.request_timeout.as_millis() as u64)
            } else {
                GistError::Http(err)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(GistError::from_status_code(status.as_u16(), message));
        }
        Ok(response)
    }

    /// Lit le gist complet
    pub async fn fetch_gist(&self) -> Result<GistResponse> {
        let response = self.send(self.request(reqwest::Method::GET)?).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Lit le contenu du fichier de configuration et mémorise son nom
    pub async fn fetch_config_text(&self) -> Result<String> {
        let gist = self.fetch_gist().await?;
        let expected = self.file_name();
        let (name, content) = select_config_file(&gist.files, &expected)
            .or_else(|_| select_config_file(&gist.files, DEFAULT_FILE_NAME))?;

        if name != expected {
            debug!(file = %name, "Using config file found by pattern");
            *self.file_name.lock() = name.to_string();
        }
        Ok(content.to_string())
    }

    /// Remplace le contenu du fichier de configuration
    pub async fn update_gist(&self, content: &str) -> Result<()> {
        let mut files = Map::new();
        files.insert(self.file_name(), json!({ "content": content }));
        let body = json!({ "files": files });

        self.send(self.request(reqwest::Method::PATCH)?.json(&body))
            .await?;
        Ok(())
    }
}
