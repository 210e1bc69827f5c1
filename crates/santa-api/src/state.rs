use std::sync::Arc;

use tracing::error;

use santa_draw::DrawService;
use santa_types::{GroupId, UserId};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub draws: DrawService,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Only the group owner may run draws and manage exclusions.
    pub fn ensure_owner(&self, group_id: GroupId, user_id: UserId) -> Result<(), ApiError> {
        let group = self
            .draws
            .db()
            .get_group(group_id)?
            .ok_or(ApiError::NotFound)?;
        if group.owner_id != user_id {
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

/// Run blocking DB and solver work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
}
