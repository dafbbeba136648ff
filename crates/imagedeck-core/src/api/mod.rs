//! REST API client module for the imaging server.
//!
//! This module provides the `ApiClient` for communicating with the DRBL /
//! Clonezilla control API: service restarts, configuration changes, image
//! create/restore/save, and the login/refresh/logout session endpoints.
//!
//! The API uses bearer token authentication obtained from `/api/login`.

pub mod client;
pub mod error;
pub mod poll;

pub use client::{ApiClient, DEFAULT_TIMEOUT};
pub use error::CallError;
pub use poll::poll_images;
