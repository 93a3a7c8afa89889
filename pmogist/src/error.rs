//! Gestion des erreurs pour le stockage du catalogue

use pmoutils::Retryable;
use thiserror::Error;

/// Type Result personnalisé pour pmogist
pub type Result<T> = std::result::Result<T, GistError>;

/// Erreurs possibles lors de la lecture ou de l'écriture du catalogue
#[derive(Error, Debug)]
pub enum GistError {
    /// Identifiant du gist ou jeton d'accès manquant
    #[error("Gist configuration error: {0}")]
    Configuration(String),

    /// Délai de requête dépassé
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Jeton refusé (401/403)
    #[error("Access denied: {0}")]
    Unauthorized(String),

    /// Gist, catégorie, sous-catégorie ou vidéo introuvable
    #[error("Not found: {0}")]
    NotFound(String),

    /// Aucun fichier de configuration dans le gist
    #[error("videos-config.json not found in gist. Available files: {available}")]
    ConfigFileNotFound { available: String },

    /// Erreur de l'API GitHub
    #[error("GitHub API error (code {code}): {message}")]
    ApiError { code: u16, message: String },

    /// Document mal formé, identifiant en double
    #[error("Validation error: {0}")]
    Validation(String),

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

impl GistError {
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

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GistError::NotFound(_) | GistError::ConfigFileNotFound { .. }
        )
    }
}

impl Retryable for GistError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            GistError::Timeout(_) | GistError::ApiError { .. } | GistError::Http(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            GistError::from_status_code(401, "bad credentials"),
            GistError::Unauthorized(_)
        ));
        assert!(GistError::from_status_code(404, "gone").is_not_found());
        assert!(matches!(
            GistError::from_status_code(502, "bad gateway"),
            GistError::ApiError { code: 502, .. }
        ));
    }

    #[test]
    fn test_only_transient_errors_are_retried() {
        assert!(GistError::Timeout(15_000).is_retryable());
        assert!(GistError::from_status_code(500, "boom").is_retryable());
        assert!(!GistError::from_status_code(401, "token").is_retryable());
        assert!(!GistError::from_status_code(404, "gone").is_retryable());
        assert!(!GistError::Validation("duplicate".into()).is_retryable());
        assert!(!GistError::Configuration("no token".into()).is_retryable());
        assert!(
            !GistError::ConfigFileNotFound {
                available: "notes.md".into()
            }
            .is_retryable()
        );
    }
}
