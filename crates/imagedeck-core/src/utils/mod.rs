//! Input validation helpers shared by the workflow plans and the CLI.

pub mod validate;

// Re-export commonly used functions at module level
pub use validate::{invalid_config_fields, is_valid_image_name, normalize_bearer};
