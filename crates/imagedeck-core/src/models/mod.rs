//! Request and response types for the imaging server API.
//!
//! - `Ack`: a parsed JSON reply, inspected by workflow steps
//! - `ImageList`: the normalised `images` field of list-images
//! - `RestoreRequest`, `SaveRequest`: image operation payloads
//! - `ConfigChanges`: the changed fields sent to apply-config

pub mod ack;
pub mod config;
pub mod image;

pub use ack::Ack;
pub use config::{ConfigChanges, ConfigSection};
pub use image::{ImageList, RestoreRequest, SaveRequest};
