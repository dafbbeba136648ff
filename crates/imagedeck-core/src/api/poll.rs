use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::SessionStore;
use crate::models::ImageList;

use super::ApiClient;

/// Default interval between image list refreshes
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// List images every `interval` while the session holds a credential.
///
/// The first poll happens immediately. A failed poll publishes an empty list.
/// Returns when the session is cleared or the receiver is dropped. A zero
/// `interval` is raised to one millisecond.
pub async fn poll_images(
    api: ApiClient,
    session: Arc<SessionStore>,
    interval: Duration,
    tx: mpsc::Sender<ImageList>,
) {
    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    let mut session_rx = session.subscribe();
    session_rx.borrow_and_update();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = session_rx.changed() => {
                if changed.is_err() || session_rx.borrow_and_update().is_none() {
                    info!("Session ended, stopping image poll");
                    return;
                }
                continue;
            }
        }

        let Some(token) = session.token() else {
            info!("No session, stopping image poll");
            return;
        };

        let images = match api.list_images(&token).await {
            Ok(images) => images,
            Err(e) => {
                warn!(error = %e, "Failed to list images");
                ImageList::default()
            }
        };
        debug!(count = images.len(), "Image list refreshed");

        if tx.send(images).await.is_err() {
            debug!("Image list receiver dropped, stopping poll");
            return;
        }
    }
}
