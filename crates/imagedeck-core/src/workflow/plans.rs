//! Ready-made step lists for the operator workflows.
//!
//! Each builder validates its input up front and returns a `PlanError`
//! before anything reaches the network.

use crate::api::ApiClient;
use crate::models::{ConfigChanges, ImageList, RestoreRequest, SaveRequest};
use crate::utils::{invalid_config_fields, is_valid_image_name};

use super::error::PlanError;
use super::step::{Expectation, StepSpec};

// ============================================================================
// Acknowledgements
// ============================================================================

pub const DRBL_STARTED: &str = "drbl started";
pub const SELECT_IN_CLIENT_STARTED: &str = "select_in_client started";
pub const DISK_RESTORE_STARTED: &str = "disk restore started";
pub const DISK_SAVE_STARTED: &str = "disk save started";

fn restart_step(api: &ApiClient, label: &str) -> StepSpec {
    let api = api.clone();
    StepSpec::new(label, Expectation::Status(DRBL_STARTED), move |token| async move {
        api.restart_service(&token).await
    })
}

fn checked_image_name(name: &str) -> Result<String, PlanError> {
    let name = name.trim();
    if !is_valid_image_name(name) {
        return Err(PlanError::InvalidImageName(name.to_string()));
    }
    Ok(name.to_string())
}

/// Restart the DRBL server.
pub fn restart(api: &ApiClient) -> Vec<StepSpec> {
    vec![restart_step(api, "Restart DRBL server")]
}

/// Restart, then let clients pick a disk to image.
pub fn create_image(api: &ApiClient) -> Vec<StepSpec> {
    let mode_api = api.clone();
    vec![
        restart_step(api, "Restart DRBL server"),
        StepSpec::new(
            "Set Clonezilla to select_in_client",
            Expectation::Status(SELECT_IN_CLIENT_STARTED),
            move |token| async move { mode_api.set_image_mode(&token).await },
        ),
    ]
}

/// Checks on a restore request that need no server state: the image name
/// and the wait time. Returns the request with the name trimmed.
pub fn check_restore_request(request: RestoreRequest) -> Result<RestoreRequest, PlanError> {
    let image = checked_image_name(&request.image)?;
    if request.max_time_to_wait < 1 {
        return Err(PlanError::InvalidMaxTime);
    }
    Ok(RestoreRequest { image, ..request })
}

/// Restart, then multicast `request.image` to waiting clients.
///
/// The image must be one the server currently lists.
pub fn restore_image(
    api: &ApiClient,
    request: RestoreRequest,
    available: &ImageList,
) -> Result<Vec<StepSpec>, PlanError> {
    let request = check_restore_request(request)?;
    if !available.contains(&request.image) {
        return Err(PlanError::UnknownImage(request.image));
    }

    let restore_api = api.clone();
    Ok(vec![
        restart_step(api, "Restart DRBL server"),
        StepSpec::new(
            "Restore disk from image",
            Expectation::Status(DISK_RESTORE_STARTED),
            move |token| async move { restore_api.restore_image(&token, &request).await },
        ),
    ])
}

/// Restart, then save client disks under `name`.
pub fn save_image(api: &ApiClient, name: &str) -> Result<Vec<StepSpec>, PlanError> {
    let request = SaveRequest {
        image: checked_image_name(name)?,
    };
    let save_api = api.clone();
    Ok(vec![
        restart_step(api, "Restart DRBL server"),
        StepSpec::new(
            "Save disk image",
            Expectation::Status(DISK_SAVE_STARTED),
            move |token| async move { save_api.save_image(&token, &request).await },
        ),
    ])
}

/// Send the changed fields, then start DRBL so they take effect.
pub fn apply_config(api: &ApiClient, changes: ConfigChanges) -> Result<Vec<StepSpec>, PlanError> {
    if changes.is_empty() {
        return Err(PlanError::NoChanges);
    }
    let invalid = invalid_config_fields(&changes);
    if !invalid.is_empty() {
        return Err(PlanError::InvalidFields(invalid));
    }

    let config_api = api.clone();
    let start_api = api.clone();
    Ok(vec![
        StepSpec::new(
            "Apply config changes",
            Expectation::NoErrorField,
            move |token| async move { config_api.apply_config(&token, &changes).await },
        ),
        StepSpec::new(
            "Restart DRBL",
            Expectation::Status(DRBL_STARTED),
            move |token| async move { start_api.start_service(&token).await },
        ),
    ])
}
