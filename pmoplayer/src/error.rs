//! Gestion des erreurs pour le lecteur intégré

use thiserror::Error;

/// Type Result personnalisé pour pmoplayer
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Erreurs possibles autour du SDK et des lecteurs
///
/// `Clone` est requis : le chargement du SDK est partagé entre plusieurs
/// appelants qui reçoivent tous le même résultat.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayerError {
    /// Le SDK n'a pas signalé sa disponibilité à temps
    #[error("Widget SDK load timeout after {0} ms")]
    SdkLoadTimeout(u64),

    /// Échec du chargement du script du SDK
    #[error("Failed to load widget SDK: {0}")]
    SdkLoadFailed(String),

    /// Identifiant de conteneur ou de vidéo manquant
    #[error("Missing identifier: {0}")]
    MissingIdentifier(&'static str),

    /// Le service a été détruit
    #[error("Player service has been destroyed")]
    ServiceDestroyed,

    /// La session a été détruite
    #[error("Player session has been destroyed")]
    SessionDestroyed,

    /// Erreur remontée par le lecteur lui-même
    #[error("Player error: {0}")]
    Provider(String),
}

impl PlayerError {
    /// Vérifie si l'erreur provient du chargement du SDK
    pub fn is_sdk_load_error(&self) -> bool {
        matches!(
            self,
            PlayerError::SdkLoadTimeout(_) | PlayerError::SdkLoadFailed(_)
        )
    }
}
