//! Core library for imagedeck.
//!
//! Talks to the DRBL / Clonezilla control API of an imaging server:
//! - `api`: the remote call gateway and the image list poller
//! - `auth`: session storage, background refresh, remembered passwords
//! - `workflow`: multi-step operations with per-step progress
//! - `models`: request and reply types
//! - `config`: persisted client settings

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;
pub mod workflow;

pub use api::{ApiClient, CallError};
pub use auth::{Credential, SessionEvent, SessionLifecycle, SessionStore};
pub use config::Config;
pub use workflow::{Orchestrator, PlanError, StepFailure, WorkflowError};
