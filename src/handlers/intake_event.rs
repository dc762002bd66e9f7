use axum::{
    Json,
    extract::{Path, State},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::IntakeEvent;
use crate::state::AppState;
use crate::store::Store;

/// POST /internal/intake-events/{id}/taken
///
/// 服用済みにする（PENDING / MISSED から TAKEN へ）
///
/// # Errors
/// イベントが存在しない、または既に服用済みの場合は 404
pub async fn mark_taken(
    State(state): State<AppState>,
    Path(intake_event_id): Path<Uuid>,
) -> Result<Json<IntakeEvent>, AppError> {
    let event = state
        .store
        .mark_intake_event_taken(intake_event_id, OffsetDateTime::now_utc())
        .await?
        .ok_or(AppError::NotFound("服薬イベント"))?;

    tracing::info!(intake_event_id = %event.id, user_id = %event.user_id, "服用済みに更新");

    Ok(Json(event))
}
