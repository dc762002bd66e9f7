use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// 服薬イベントの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "intake_status", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum IntakeStatus {
    Pending,
    Taken,
    Missed,
}

/// 服薬イベント（スケジュールから展開された1回分の服薬予定）
///
/// (user_id, medication_schedule_id, scheduled_at) で一意
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct IntakeEvent {
    pub id: Uuid,
    pub user_id: Uuid,
    pub medication_reminder_id: Uuid,
    /// スケジュール削除後は NULL になる
    pub medication_schedule_id: Option<Uuid>,
    pub scheduled_at: OffsetDateTime,
    pub status: IntakeStatus,
    pub attempts: i32,
    pub taken_at: Option<OffsetDateTime>,
}

/// 新規作成する服薬イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntakeEvent {
    pub user_id: Uuid,
    pub medication_reminder_id: Uuid,
    pub medication_schedule_id: Uuid,
    pub scheduled_at: OffsetDateTime,
}

/// 再同期時に削除する未来イベントの範囲
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeEventScope {
    Reminder(Uuid),
    Schedule(Uuid),
}
