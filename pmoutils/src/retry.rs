//! Politique de ré-essai avec backoff exponentiel
//!
//! Une seule implémentation sert les deux chemins réseau : la tentative `n`
//! (à partir de 1) est suivie, en cas d'échec ré-essayable, d'une attente de
//! `base_delay * 2^(n-1)`. Les erreurs non ré-essayables sont propagées
//! immédiatement, sans attente.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Nombre de tentatives par défaut
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 2;

/// Délai de base par défaut entre deux tentatives
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Classification d'une erreur vis-à-vis du ré-essai
///
/// Les crates clientes l'implémentent sur leur type d'erreur pour déclarer
/// les classes à ne jamais répéter (annulation, permission refusée,
/// ressource introuvable, configuration, validation).
pub trait Retryable {
    /// `true` si répéter l'opération a une chance d'aboutir
    fn is_retryable(&self) -> bool;
}

/// Politique de ré-essai partagée
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy {
    /// Crée une politique. Un nombre de tentatives nul est ramené à 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Politique sans ré-essai (une seule tentative)
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Nombre maximal de tentatives
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Délai de base
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Attente après l'échec de la tentative `attempt` (1-indexée)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Exécute `operation` en utilisant la classification [`Retryable`] de l'erreur
    ///
    /// La closure reçoit le numéro de tentative (1-indexé).
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_if(operation, |err: &E| err.is_retryable()).await
    }

    /// Exécute `operation` avec un prédicat explicite de ré-essai
    pub async fn run_if<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !is_retryable(&err) => {
                    debug!(attempt, "Non-retryable error, giving up: {}", err);
                    return Err(err);
                }
                Err(err) if attempt >= self.max_attempts => {
                    warn!(
                        attempts = self.max_attempts,
                        "Operation failed after all attempts: {}", err
                    );
                    return Err(err);
                }
                Err(err) => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Attempt failed, retrying: {}",
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Fatal,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?}", self)
        }
    }

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    #[test]
    fn test_delay_doubles_per_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(1000));

        let result: Result<(), TestError> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Transient) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1000));

        let result: Result<(), TestError> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Fatal) }
            })
            .await;

        assert!(matches!(result, Err(TestError::Fatal)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failure() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1000));
        let start = tokio::time::Instant::now();

        let result: Result<u32, TestError> = policy
            .run(|attempt| async move {
                if attempt < 3 {
                    Err(TestError::Transient)
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        // 1000 ms après la 1re tentative, 2000 ms après la 2e
        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_predicate_overrides_classification() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(10));

        let result: Result<(), TestError> = policy
            .run_if(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(TestError::Transient) }
                },
                |_| false,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
