use axum::{
    Json,
    extract::{Path, State},
};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::ResyncSummary;
use crate::state::AppState;

/// POST /internal/reminders/{id}/resync
///
/// リマインダーの有効化・無効化・削除後に CRUD 層から呼び出される
pub async fn resync_reminder(
    State(state): State<AppState>,
    Path(reminder_id): Path<Uuid>,
) -> Result<Json<ResyncSummary>, AppError> {
    let summary = state
        .generator
        .resync_upcoming_events_for_reminder(reminder_id, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(summary))
}

/// POST /internal/schedules/{id}/resync
///
/// スケジュールの作成・更新・削除後に CRUD 層から呼び出される
pub async fn resync_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ResyncSummary>, AppError> {
    let summary = state
        .generator
        .resync_upcoming_events_for_schedule(schedule_id, OffsetDateTime::now_utc())
        .await?;

    Ok(Json(summary))
}
