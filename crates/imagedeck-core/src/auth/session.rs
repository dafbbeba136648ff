use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, warn};

/// Session file name in the data directory
pub const SESSION_FILE: &str = "session.json";

/// How long before expiry a credential should be refreshed
pub const REFRESH_LEAD_MINUTES: i64 = 2;

/// A bearer token and the instant it stops being accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Instant at which the lifecycle manager should refresh this credential
    pub fn refresh_at(&self) -> DateTime<Utc> {
        self.expires_at - Duration::minutes(REFRESH_LEAD_MINUTES)
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// Cached profile of the logged-in operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
}

/// Everything persisted for one session. Written and removed as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(flatten)]
    pub credential: Credential,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

/// Process-wide holder of the current credential.
///
/// Backed by a JSON file so a session survives restarts. Every `set` and
/// `clear` is published on a watch channel; subscribers (the lifecycle
/// manager, running workflows) observe each change as a new epoch.
pub struct SessionStore {
    path: Option<PathBuf>,
    state: watch::Sender<Option<SessionData>>,
}

impl SessionStore {
    /// Hydrate from `path`. A missing, unreadable or malformed file starts
    /// with no session.
    pub fn init(path: PathBuf) -> Self {
        let data = match Self::load(&path) {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, path = %path.display(), "Ignoring unreadable session file");
                None
            }
        };
        debug!(has_session = data.is_some(), "Session store initialized");
        let (state, _) = watch::channel(data);
        Self {
            path: Some(path),
            state,
        }
    }

    /// A store that never touches disk
    pub fn in_memory() -> Self {
        let (state, _) = watch::channel(None);
        Self { path: None, state }
    }

    fn load(path: &Path) -> Result<Option<SessionData>> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session file"),
        };
        let data: SessionData =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(data))
    }

    pub fn get(&self) -> Option<Credential> {
        self.state.borrow().as_ref().map(|d| d.credential.clone())
    }

    pub fn token(&self) -> Option<String> {
        self.state.borrow().as_ref().map(|d| d.credential.token.clone())
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.state.borrow().as_ref().and_then(|d| d.user.clone())
    }

    pub fn is_active(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Replace the credential, keeping the cached user profile.
    pub fn set(&self, credential: Credential) -> Result<()> {
        let user = self.user();
        self.store(SessionData { credential, user })
    }

    /// Replace the credential and the cached user profile together (login).
    pub fn set_with_user(&self, credential: Credential, user: UserProfile) -> Result<()> {
        self.store(SessionData {
            credential,
            user: Some(user),
        })
    }

    /// Disk is written before subscribers are told. The in-memory value is
    /// updated even when the write fails, so this process keeps using the
    /// newest credential.
    fn store(&self, data: SessionData) -> Result<()> {
        let persisted = match self.path {
            Some(ref path) => Self::persist(path, &data),
            None => Ok(()),
        };
        if let Err(ref e) = persisted {
            error!(error = %e, "Session file not updated; it no longer matches the active session");
        }
        debug!(expires_at = %data.credential.expires_at, "Session credential set");
        self.state.send_replace(Some(data));
        persisted
    }

    /// Write to a sibling file and rename it into place so the session file
    /// is never observed half-written.
    fn persist(path: &Path, data: &SessionData) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(data)?;
        std::fs::write(&tmp, contents).context("Failed to write session file")?;
        std::fs::rename(&tmp, path).context("Failed to replace session file")?;
        Ok(())
    }

    /// Drop the credential, its expiry and the cached user profile.
    ///
    /// The file is removed first. The in-memory session is dropped even if
    /// removal fails.
    pub fn clear(&self) -> Result<()> {
        let removed = match self.path {
            Some(ref path) => match std::fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => {
                    error!(error = %e, path = %path.display(), "Session file could not be removed and will be reloaded on next start");
                    Err(e).context("Failed to remove session file")
                }
            },
            None => Ok(()),
        };
        if self.state.send_replace(None).is_some() {
            debug!("Session cleared");
        }
        removed
    }

    /// Observe every credential change. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionData>> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(token: &str, minutes: i64) -> Credential {
        Credential::new(token, Utc::now() + Duration::minutes(minutes))
    }

    #[test]
    fn test_set_then_get_round_trips() {
        let store = SessionStore::in_memory();
        let c = credential("abc", 30);
        store.set(c.clone()).unwrap();
        assert_eq!(store.get(), Some(c));
        assert_eq!(store.token().as_deref(), Some("abc"));
    }

    #[test]
    fn test_clear_then_get_is_absent() {
        let store = SessionStore::in_memory();
        store
            .set_with_user(credential("abc", 30), UserProfile { login: "admin".into() })
            .unwrap();
        store.clear().unwrap();
        assert_eq!(store.get(), None);
        assert_eq!(store.user(), None);
        assert!(!store.is_active());

        // Clearing twice is harmless
        store.clear().unwrap();
        assert_eq!(store.get(), None);
    }

    #[test]
    fn test_clear_drops_session_even_if_file_remains() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        let store = SessionStore::init(path.clone());
        store.set(credential("abc", 30)).unwrap();
        let mut rx = store.subscribe();

        // A non-empty directory in place of the file cannot be removed
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        assert!(store.clear().is_err());
        assert_eq!(store.get(), None);
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_failed_write_still_updates_memory() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "x").unwrap();
        let store = SessionStore::init(blocker.join(SESSION_FILE));

        let c = credential("abc", 30);
        assert!(store.set(c.clone()).is_err());
        assert_eq!(store.get(), Some(c));
    }

    #[test]
    fn test_set_keeps_user_profile() {
        let store = SessionStore::in_memory();
        store
            .set_with_user(credential("old", 30), UserProfile { login: "admin".into() })
            .unwrap();
        store.set(credential("new", 30)).unwrap();
        assert_eq!(store.token().as_deref(), Some("new"));
        assert_eq!(store.user().map(|u| u.login).as_deref(), Some("admin"));
    }

    #[test]
    fn test_persisted_session_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SESSION_FILE);

        let store = SessionStore::init(path.clone());
        assert!(store.get().is_none());
        let c = credential("persisted", 30);
        store
            .set_with_user(c.clone(), UserProfile { login: "admin".into() })
            .unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let reloaded = SessionStore::init(path.clone());
        assert_eq!(reloaded.get(), Some(c));
        assert_eq!(reloaded.user().map(|u| u.login).as_deref(), Some("admin"));

        reloaded.clear().unwrap();
        assert!(!path.exists());
        assert!(SessionStore::init(path).get().is_none());
    }

    #[test]
    fn test_partial_session_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_FILE);
        std::fs::write(&path, r#"{"token": "abc"}"#).unwrap();

        let store = SessionStore::init(path);
        assert!(store.get().is_none());
    }

    #[test]
    fn test_session_file_wire_format() {
        let data = SessionData {
            credential: Credential::new(
                "abc",
                "2026-01-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap(),
            ),
            user: Some(UserProfile { login: "admin".into() }),
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["token"], "abc");
        assert_eq!(json["expiresAt"], "2026-01-01T12:00:00Z");
        assert_eq!(json["user"]["login"], "admin");
    }

    #[test]
    fn test_subscribers_see_changes() {
        let store = SessionStore::in_memory();
        let mut rx = store.subscribe();
        assert!(rx.borrow_and_update().is_none());

        store.set(credential("abc", 30)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|d| d.credential.token.clone()),
            Some("abc".to_string())
        );

        store.clear().unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_none());
    }

    #[test]
    fn test_refresh_at_is_two_minutes_before_expiry() {
        let c = credential("abc", 30);
        assert_eq!(c.expires_at - c.refresh_at(), Duration::minutes(2));
        assert!(!c.is_expired());
        assert!(c.minutes_until_expiry() >= 29);
        assert!(credential("old", -5).is_expired());
        assert_eq!(credential("old", -5).minutes_until_expiry(), 0);
    }
}
