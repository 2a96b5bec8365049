use crate::api::HealthProbe;
use crate::navigation::Route;
use crate::session::Session;
use std::future::Future;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Admit,
    Redirect(Route),
}

/// Gate in front of protected views: credential present and backend alive
pub struct SessionGuard<P> {
    session: Session,
    probe: P,
}

impl<P: HealthProbe> SessionGuard<P> {
    pub fn new(session: Session, probe: P) -> Self {
        Self { session, probe }
    }

    /// One check per activation. Nothing protected runs until this resolves.
    pub async fn activate(&self) -> GuardDecision {
        if !self.session.is_authenticated() {
            debug!("No stored credential, redirecting to {}", Route::Login);
            self.session.expire();
            return GuardDecision::Redirect(Route::Login);
        }

        match self.probe.probe().await {
            Ok(()) => GuardDecision::Admit,
            Err(e) => {
                warn!("Backend health probe failed: {}", e);
                self.session.expire();
                GuardDecision::Redirect(Route::Login)
            }
        }
    }

    /// Run `view` only when admitted; otherwise it is never polled
    pub async fn enter<F, Fut, T>(&self, view: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        match self.activate().await {
            GuardDecision::Admit => Some(view().await),
            GuardDecision::Redirect(_) => None,
        }
    }
}
