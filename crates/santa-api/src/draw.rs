use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use santa_types::GroupId;
use santa_types::api::{Claims, DrawResponse, PreviewResponse, ReceiverResponse};

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// POST /groups/{group_id}/draw: owner triggers the draw.
pub async fn run_draw(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = blocking(&state, move |s| {
        s.ensure_owner(group_id, claims.sub)?;
        Ok(s.draws.run(group_id)?)
    })
    .await?;

    info!(group_id, by = claims.sub, "Draw triggered over HTTP");

    Ok((
        StatusCode::CREATED,
        Json(DrawResponse {
            group_id,
            participants: summary.participants.len(),
        }),
    ))
}

/// GET /groups/{group_id}/draw/preview: would a draw succeed right now?
pub async fn preview_draw(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let preview = blocking(&state, move |s| {
        s.ensure_owner(group_id, claims.sub)?;
        Ok(s.draws.preview(group_id)?)
    })
    .await?;

    Ok(Json(PreviewResponse {
        feasible: preview.feasible,
        sample: preview.sample.map(|m| m.pairings()),
    }))
}

/// GET /groups/{group_id}/draw/me: the caller's own receiver.
pub async fn my_receiver(
    State(state): State<AppState>,
    Path(group_id): Path<GroupId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let receiver_user_id =
        blocking(&state, move |s| Ok(s.draws.receiver_for(group_id, claims.sub)?)).await?;

    Ok(Json(ReceiverResponse { receiver_user_id }))
}
