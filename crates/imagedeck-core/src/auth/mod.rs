//! Authentication module for managing operator sessions.
//!
//! This module provides:
//! - `SessionStore`: the current credential, persisted to disk, with change notification
//! - `SessionLifecycle`: background refresh of the credential before it expires
//! - `CredentialStore`: optional remembered passwords in the OS keychain
//!
//! Credentials are refreshed two minutes before they expire; a failed refresh
//! ends the session.

pub mod credentials;
pub mod lifecycle;
pub mod session;

pub use credentials::CredentialStore;
pub use lifecycle::{refresh_delay, LifecycleState, SessionEvent, SessionLifecycle};
pub use session::{Credential, SessionData, SessionStore, UserProfile};
