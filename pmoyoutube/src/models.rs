//! Modèles de données pour les métadonnées YouTube

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Référence vers une vidéo du catalogue
///
/// Produite à la lecture du document distant ; `internal_id` est l'identifiant
/// éditorial, `external_id` l'identifiant YouTube.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(rename = "id")]
    pub internal_id: String,
    #[serde(rename = "youtubeId")]
    pub external_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<String>,
}

impl ItemReference {
    pub fn new(internal_id: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            internal_id: internal_id.into(),
            external_id: external_id.into(),
            subcategory_id: None,
        }
    }

    pub fn with_subcategory(mut self, subcategory_id: impl Into<String>) -> Self {
        self.subcategory_id = Some(subcategory_id.into());
        self
    }
}

/// Miniature d'une vidéo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// Jeu de miniatures indexé par qualité (`default`, `medium`, `high`, ...)
pub type Thumbnails = BTreeMap<String, Thumbnail>;

/// Compteur statistique, numérique ou indisponible ("N/A")
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stat {
    Count(u64),
    Unavailable,
}

impl Stat {
    pub fn count(&self) -> Option<u64> {
        match self {
            Stat::Count(n) => Some(*n),
            Stat::Unavailable => None,
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Count(n) => write!(f, "{}", n),
            Stat::Unavailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl Serialize for Stat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Stat::Count(n) => serializer.serialize_u64(*n),
            Stat::Unavailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for Stat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Stat::Count(n),
            Raw::Text(_) => Stat::Unavailable,
        })
    }
}

/// Marqueur des valeurs indisponibles
pub const NOT_AVAILABLE: &str = "N/A";

/// Métadonnées normalisées d'une vidéo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedMetadata {
    #[serde(rename = "id")]
    pub internal_id: String,
    #[serde(rename = "youtubeId")]
    pub external_id: String,
    pub title: String,
    pub description: String,
    pub thumbnails: Thumbnails,
    pub views: Stat,
    pub likes: Stat,
    pub comments: Stat,
    pub duration: String,
    pub published_at: Option<String>,
    pub channel_title: String,
    /// `true` si la vidéo était absente de la réponse de l'API
    #[serde(default)]
    pub placeholder: bool,
}

// Types de réponse de l'API YouTube Data v3 (`/videos`)

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct VideoListResponse {
    #[serde(default)]
    pub items: Vec<VideoItem>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<Snippet>,
    #[serde(default)]
    pub statistics: Option<Statistics>,
    #[serde(default)]
    pub content_details: Option<ContentDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnails: Option<Thumbnails>,
    pub published_at: Option<String>,
    pub channel_title: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentDetails {
    pub duration: Option<String>,
}
