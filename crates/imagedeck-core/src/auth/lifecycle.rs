//! Keeps the session credential fresh without operator involvement.
//!
//! One background task watches the `SessionStore`. For each credential it
//! sleeps until two minutes before expiry, then exchanges the token for a new
//! one. Any change to the store interrupts the sleep, so a timer never fires
//! for a credential that has been replaced or cleared. A failed refresh
//! clears the store and emits `SessionEvent::Lost` once.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::api::ApiClient;

use super::session::{Credential, SessionData, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No credential in the store
    NoSession,
    /// A refresh timer is pending for the current credential
    Scheduled,
    /// The refresh call is in flight
    Refreshing,
    /// The last refresh failed; the store was cleared
    Invalid,
}

/// Notifications for the UI layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Refreshed { expires_at: DateTime<Utc> },
    /// The session is gone and the operator must log in again
    Lost { reason: String },
}

/// Delay until `credential` should be refreshed, never negative
pub fn refresh_delay(credential: &Credential, now: DateTime<Utc>) -> Duration {
    (credential.refresh_at() - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Handle to the refresh task. Dropping it cancels any pending timer.
pub struct SessionLifecycle {
    handle: JoinHandle<()>,
    state: watch::Receiver<LifecycleState>,
}

impl SessionLifecycle {
    /// Spawn the refresh task. Must be called inside a tokio runtime.
    pub fn start(
        api: ApiClient,
        session: Arc<SessionStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (state_tx, state_rx) = watch::channel(LifecycleState::NoSession);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let worker = RefreshWorker {
            api,
            session,
            state: state_tx,
            events: events_tx,
        };
        let handle = tokio::spawn(worker.run());

        (
            Self {
                handle,
                state: state_rx,
            },
            events_rx,
        )
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.clone()
    }

    /// Stop the task and cancel any pending refresh
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for SessionLifecycle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct RefreshWorker {
    api: ApiClient,
    session: Arc<SessionStore>,
    state: watch::Sender<LifecycleState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl RefreshWorker {
    fn set_state(&self, state: LifecycleState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            debug!(from = ?*current, to = ?state, "Session lifecycle transition");
            *current = state;
            true
        });
    }

    async fn run(self) {
        let mut rx = self.session.subscribe();

        loop {
            let current = rx
                .borrow_and_update()
                .as_ref()
                .map(|d| d.credential.clone());

            let Some(credential) = current else {
                // An invalidated session stays Invalid until a new login
                if *self.state.borrow() != LifecycleState::Invalid {
                    self.set_state(LifecycleState::NoSession);
                }
                if rx.changed().await.is_err() {
                    return;
                }
                continue;
            };

            let delay = refresh_delay(&credential, Utc::now());
            self.set_state(LifecycleState::Scheduled);
            debug!(delay_secs = delay.as_secs(), "Session refresh scheduled");

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    debug!("Credential changed, rescheduling refresh");
                    continue;
                }
                () = tokio::time::sleep(delay) => {}
            }

            self.refresh(&rx, credential).await;
        }
    }

    async fn refresh(&self, rx: &watch::Receiver<Option<SessionData>>, credential: Credential) {
        self.set_state(LifecycleState::Refreshing);
        let result = self.api.refresh_session(&credential.token).await;

        // A login or logout during the call makes this result stale
        if rx.has_changed().unwrap_or(true) {
            debug!("Credential changed during refresh, discarding result");
            return;
        }

        match result {
            Ok(fresh) => {
                let expires_at = fresh.expires_at;
                if let Err(e) = self.session.set(fresh) {
                    warn!(error = %e, "Failed to persist refreshed session");
                }
                info!(%expires_at, "Session refreshed");
                let _ = self.events.send(SessionEvent::Refreshed { expires_at });
            }
            Err(e) => {
                if e.is_unauthorized() {
                    warn!("Session refresh rejected as unauthorized");
                } else {
                    warn!(error = %e, "Session refresh failed");
                }
                self.invalidate(e.to_string());
            }
        }
    }

    fn invalidate(&self, reason: String) {
        self.set_state(LifecycleState::Invalid);
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session file");
        }
        error!(%reason, "Session lost");
        let _ = self.events.send(SessionEvent::Lost { reason });
    }
}
