//! Normalisation des réponses de l'API en [`NormalizedMetadata`]

use crate::models::{
    ItemReference, NOT_AVAILABLE, NormalizedMetadata, Stat, Thumbnail, Thumbnails, VideoItem,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Longueur maximale par défaut des descriptions
pub const DEFAULT_MAX_DESCRIPTION_LENGTH: usize = 200;

const THUMBNAIL_BASE: &str = "https://img.youtube.com/vi";

const TITLE_UNAVAILABLE: &str = "Title unavailable";
const DESCRIPTION_UNAVAILABLE: &str = "Description unavailable";
const UNKNOWN_CHANNEL: &str = "Unknown channel";
const LOADING: &str = "Loading...";
const LOADING_DESCRIPTION: &str = "Loading description...";

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"PT(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?").expect("valid duration regex")
});

/// Convertit les enregistrements bruts de l'API
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    max_description_length: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DESCRIPTION_LENGTH)
    }
}

impl Normalizer {
    pub fn new(max_description_length: usize) -> Self {
        Self {
            max_description_length,
        }
    }

    /// Normalise un enregistrement de l'API pour la référence donnée
    pub fn normalize(&self, item: &VideoItem, reference: &ItemReference) -> NormalizedMetadata {
        let snippet = item.snippet.clone().unwrap_or_default();
        let statistics = item.statistics.clone().unwrap_or_default();
        let duration = item
            .content_details
            .as_ref()
            .and_then(|details| details.duration.as_deref());

        NormalizedMetadata {
            internal_id: reference.internal_id.clone(),
            external_id: item.id.clone(),
            title: non_empty(snippet.title).unwrap_or_else(|| TITLE_UNAVAILABLE.to_string()),
            description: truncate(
                &non_empty(snippet.description)
                    .unwrap_or_else(|| DESCRIPTION_UNAVAILABLE.to_string()),
                self.max_description_length,
            ),
            thumbnails: snippet
                .thumbnails
                .filter(|thumbnails| !thumbnails.is_empty())
                .unwrap_or_else(|| default_thumbnails(&item.id)),
            views: parse_stat(statistics.view_count.as_deref()),
            likes: parse_stat(statistics.like_count.as_deref()),
            comments: parse_stat(statistics.comment_count.as_deref()),
            duration: format_duration(duration),
            published_at: non_empty(snippet.published_at),
            channel_title: non_empty(snippet.channel_title)
                .unwrap_or_else(|| UNKNOWN_CHANNEL.to_string()),
            placeholder: false,
        }
    }

    /// Métadonnées de remplacement pour une vidéo absente de la réponse
    pub fn placeholder(&self, reference: &ItemReference) -> NormalizedMetadata {
        NormalizedMetadata {
            internal_id: reference.internal_id.clone(),
            external_id: reference.external_id.clone(),
            title: LOADING.to_string(),
            description: LOADING_DESCRIPTION.to_string(),
            thumbnails: default_thumbnails(&reference.external_id),
            views: Stat::Unavailable,
            likes: Stat::Unavailable,
            comments: Stat::Unavailable,
            duration: NOT_AVAILABLE.to_string(),
            published_at: None,
            channel_title: LOADING.to_string(),
            placeholder: true,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Tronque `text` à `max_chars` caractères, suivi de "..." si tronqué
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head.trim())
}

/// Lit les chiffres de tête d'un compteur ("1234", "12abc")
///
/// Les compteurs sont non signés : une valeur signée ("-5") donne N/A.
pub fn parse_stat(value: Option<&str>) -> Stat {
    let Some(value) = value else {
        return Stat::Unavailable;
    };
    let digits: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<u64>()
        .map(Stat::Count)
        .unwrap_or(Stat::Unavailable)
}

/// Convertit une durée ISO-8601 `PT#H#M#S` en `H:MM:SS` ou `M:SS`
pub fn format_duration(iso: Option<&str>) -> String {
    let Some(iso) = iso.filter(|s| !s.is_empty()) else {
        return NOT_AVAILABLE.to_string();
    };
    let Some(caps) = DURATION_RE.captures(iso) else {
        return NOT_AVAILABLE.to_string();
    };

    let part = |i: usize| -> u64 {
        caps.get(i)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0)
    };
    let (hours, minutes, seconds) = (part(1), part(2), part(3));

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Miniatures construites à partir de l'identifiant externe
pub fn default_thumbnails(external_id: &str) -> Thumbnails {
    [
        ("default", "default.jpg", 120, 90),
        ("medium", "mqdefault.jpg", 320, 180),
        ("high", "hqdefault.jpg", 480, 360),
    ]
    .into_iter()
    .map(|(quality, file, width, height)| {
        (
            quality.to_string(),
            Thumbnail {
                url: format!("{}/{}/{}", THUMBNAIL_BASE, external_id, file),
                width: Some(width),
                height: Some(height),
            },
        )
    })
    .collect()
}
