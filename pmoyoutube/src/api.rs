//! Client bas niveau de l'endpoint `/videos` de l'API YouTube Data v3

use crate::error::{Result, YoutubeError};
use crate::models::{VideoItem, VideoListResponse};
use reqwest::Client;
use tracing::debug;

/// URL de base par défaut de l'API YouTube Data v3
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Parties demandées pour chaque vidéo
const VIDEO_PARTS: &str = "snippet,statistics,contentDetails";

/// Client de l'API YouTube
#[derive(Debug, Clone)]
pub struct YoutubeApi {
    client: Client,
    api_base: String,
    api_key: Option<String>,
    max_results: usize,
}

impl YoutubeApi {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        api_key: Option<String>,
        max_results: usize,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            max_results,
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Récupère les vidéos demandées en une seule requête
    ///
    /// Les identifiants absents de la réponse sont simplement omis.
    pub async fn fetch_videos(&self, external_ids: &[&str]) -> Result<Vec<VideoItem>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }

        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| YoutubeError::Configuration("YouTube API key not configured".into()))?;

        let url = format!("{}/videos", self.api_base);
        debug!(url = %url, count = external_ids.len(), "Fetching YouTube video metadata");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&[
                ("part", VIDEO_PARTS),
                ("id", &external_ids.join(",")),
                ("key", api_key),
                ("maxResults", &self.max_results.to_string()),
            ])
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Vec<VideoItem>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(YoutubeError::from_status_code(
                status.as_u16(),
                format!("{} {}", status, body.trim()),
            ));
        }

        let body = response.text().await?;
        let data: VideoListResponse = serde_json::from_str(&body)?;

        if let Some(error) = data.error {
            return Err(YoutubeError::from_status_code(
                error.code.unwrap_or(500),
                error.message,
            ));
        }

        Ok(data.items)
    }
}
