use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use santa_types::GroupId;
use santa_types::api::{AddExclusionRequest, Claims};
use santa_types::models::Exclusion;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// POST /groups/{group_id}/exclusions: rejected with 422 if it would make
/// the draw impossible; nothing is stored in that case.
pub async fn add_exclusion(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AddExclusionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let exclusion = Exclusion::new(req.user_id, req.excluded_user_id);

    blocking(&state, move |s| {
        s.ensure_owner(group_id, claims.sub)?;
        Ok(s.draws.add_exclusion(group_id, exclusion)?)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(exclusion)))
}
