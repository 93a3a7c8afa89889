//! Gestion des erreurs pour le client YouTube

use pmoutils::Retryable;
use thiserror::Error;

/// Type Result personnalisé pour pmoyoutube
pub type Result<T> = std::result::Result<T, YoutubeError>;

/// Erreurs possibles lors de la récupération des métadonnées
#[derive(Error, Debug)]
pub enum YoutubeError {
    /// Clé d'API ou autre paramètre obligatoire manquant
    #[error("YouTube configuration error: {0}")]
    Configuration(String),

    /// Requête annulée par l'appelant ou par `abort_all`
    #[error("Request cancelled")]
    Cancelled,

    /// Délai de requête dépassé
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Clé refusée ou quota interdit (401/403)
    #[error("Access denied: {0}")]
    Unauthorized(String),

    /// Ressource non trouvée (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Erreur de l'API YouTube
    #[error("YouTube API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// Requête refusée avant envoi (lot trop grand, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Le fetcher ou le coordinateur a été détruit
    #[error("Metadata fetcher destroyed")]
    Destroyed,

    /// Erreur HTTP
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Erreur de parsing JSON
    #[error("JSON parsing error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Erreur de configuration (anyhow)
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),
}

impl YoutubeError {
    /// Crée une erreur API depuis un code de statut HTTP et un message
    pub fn from_status_code(code: u16, message: impl Into<String>) -> Self {
        match code {
            401 | 403 => Self::Unauthorized(message.into()),
            404 => Self::NotFound(message.into()),
            _ => Self::ApiError {
                code,
                message: message.into(),
            },
        }
    }

    /// Vérifie si l'erreur provient d'une annulation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, YoutubeError::Cancelled | YoutubeError::Destroyed)
    }
}

impl Retryable for YoutubeError {
    fn is_retryable(&self) -> bool {
        match self {
            YoutubeError::Timeout(_)
            | YoutubeError::ApiError { .. }
            | YoutubeError::Http(_)
            | YoutubeError::JsonParse(_) => true,
            YoutubeError::Configuration(_)
            | YoutubeError::Cancelled
            | YoutubeError::Unauthorized(_)
            | YoutubeError::NotFound(_)
            | YoutubeError::InvalidRequest(_)
            | YoutubeError::Destroyed
            | YoutubeError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            YoutubeError::from_status_code(403, "quota"),
            YoutubeError::Unauthorized(_)
        ));
        assert!(matches!(
            YoutubeError::from_status_code(404, "gone"),
            YoutubeError::NotFound(_)
        ));
        assert!(matches!(
            YoutubeError::from_status_code(503, "busy"),
            YoutubeError::ApiError { code: 503, .. }
        ));
    }

    #[test]
    fn test_retry_classes() {
        assert!(YoutubeError::Timeout(10).is_retryable());
        assert!(YoutubeError::from_status_code(500, "boom").is_retryable());
        assert!(!YoutubeError::Cancelled.is_retryable());
        assert!(!YoutubeError::from_status_code(401, "key").is_retryable());
        assert!(!YoutubeError::from_status_code(404, "gone").is_retryable());
        assert!(!YoutubeError::Configuration("no key".into()).is_retryable());
    }
}
