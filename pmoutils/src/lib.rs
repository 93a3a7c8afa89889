//! Utilitaires partagés entre les crates PMOVideos.
//!
//! Pour l'instant ce module fournit la politique de ré-essai commune aux deux
//! chemins réseau (API de métadonnées et stockage du document distant).
//!
//! # Exemple
//!
//! ```
//! use pmoutils::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(500));
//! assert_eq!(policy.delay_for(1), Duration::from_millis(500));
//! assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
//! ```

pub mod retry;

pub use retry::{RetryPolicy, Retryable};
