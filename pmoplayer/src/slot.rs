//! Emplacement global de la session active
//!
//! Au plus une session occupe l'emplacement. La revendication est de type
//! « claim-and-preempt » : pas de file d'attente, le dernier activateur gagne
//! immédiatement et l'occupant précédent passe par son teardown avant que
//! `claim` ne rende la main.

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tracing::{debug, warn};

/// Identifiant de session
pub type SessionId = u64;

/// Teardown de l'occupant, appelé au plus une fois
pub type Teardown = Box<dyn FnOnce() + Send>;

struct Occupant {
    session_id: SessionId,
    teardown: Teardown,
}

#[derive(Default)]
pub struct SessionSlot {
    occupant: Mutex<Option<Occupant>>,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revendique l'emplacement pour `session_id`
    ///
    /// Le teardown de l'occupant précédent est exécuté de façon synchrone,
    /// hors verrou. Un occupant installé pendant ce teardown est à son tour
    /// démonté : le nouvel occupant n'est posé que sur un emplacement vide.
    pub fn claim(&self, session_id: SessionId, teardown: Teardown) {
        loop {
            let previous = {
                let mut occupant = self.occupant.lock();
                match occupant.take() {
                    Some(previous) if previous.session_id != session_id => previous,
                    _ => {
                        *occupant = Some(Occupant {
                            session_id,
                            teardown,
                        });
                        return;
                    }
                }
            };
            debug!(
                previous = previous.session_id,
                next = session_id,
                "Preempting active session"
            );
            Self::run_teardown(previous);
        }
    }

    /// Libère l'emplacement s'il est occupé par `session_id`
    pub fn release_if(&self, session_id: SessionId) -> bool {
        let mut occupant = self.occupant.lock();
        if occupant.as_ref().map(|o| o.session_id) == Some(session_id) {
            *occupant = None;
            true
        } else {
            false
        }
    }

    pub fn active_session(&self) -> Option<SessionId> {
        self.occupant.lock().as_ref().map(|o| o.session_id)
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.lock().is_some()
    }

    /// Force l'occupant courant à passer par son teardown
    pub fn preempt_current(&self) -> Option<SessionId> {
        let previous = self.occupant.lock().take()?;
        let id = previous.session_id;
        Self::run_teardown(previous);
        Some(id)
    }

    fn run_teardown(occupant: Occupant) {
        let id = occupant.session_id;
        if catch_unwind(AssertUnwindSafe(occupant.teardown)).is_err() {
            warn!(session = id, "Session teardown panicked");
        }
    }
}
