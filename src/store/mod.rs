//! 定期ジョブが利用する永続化層の抽象
//!
//! 本番は [`crate::repositories::PgStore`]、テストは `memory::MemoryStore` を使う。

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{ActiveSchedule, IntakeEvent, IntakeEventScope, IntakeStatus, NewIntakeEvent};

#[async_trait]
pub trait Store: Send + Sync {
    /// 有効なリマインダーに属する有効なスケジュールをすべて取得
    async fn find_active_schedules_with_active_reminder(
        &self,
    ) -> Result<Vec<ActiveSchedule>, StoreError>;

    /// 指定リマインダーの有効なスケジュールを取得（リマインダーが無効なら空）
    async fn find_active_schedules_for_reminder(
        &self,
        reminder_id: Uuid,
    ) -> Result<Vec<ActiveSchedule>, StoreError>;

    /// 指定スケジュールを取得（スケジュールまたはリマインダーが無効なら None）
    async fn find_active_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ActiveSchedule>, StoreError>;

    /// ユーザーのタイムゾーン（未設定またはユーザー不在なら None）
    async fn find_user_timezone(&self, user_id: Uuid) -> Result<Option<String>, StoreError>;

    async fn find_intake_event(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        scheduled_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, StoreError>;

    /// 服薬イベントを作成
    ///
    /// # Errors
    /// 同じ (user_id, schedule_id, scheduled_at) が既に存在する場合は `StoreError::Conflict`
    async fn create_intake_event(&self, event: NewIntakeEvent) -> Result<IntakeEvent, StoreError>;

    /// `now` 以降かつ未服用のイベントを削除
    ///
    /// # Returns
    /// 削除された行数
    async fn delete_future_untaken_intake_events(
        &self,
        scope: IntakeEventScope,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError>;

    /// `[from, to]` に予定された PENDING イベントを予定時刻の古い順に最大 `limit` 件取得
    async fn find_pending_intake_events_in_window(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<IntakeEvent>, StoreError>;

    /// PENDING のイベントの状態を更新
    ///
    /// # Returns
    /// 更新された場合は true（既に PENDING でなければ false）
    async fn update_intake_event_status(
        &self,
        id: Uuid,
        status: IntakeStatus,
    ) -> Result<bool, StoreError>;

    async fn increment_intake_event_attempts(&self, id: Uuid) -> Result<(), StoreError>;

    /// 服用済みにする（PENDING または MISSED のみ）
    ///
    /// # Returns
    /// 更新後のイベント（存在しない、または既に TAKEN なら None）
    async fn mark_intake_event_taken(
        &self,
        id: Uuid,
        taken_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, StoreError>;

    /// 期限切れ、または `used_before` より前に使用済みのリセットトークンを削除
    async fn delete_expired_or_used_reset_tokens(
        &self,
        now: OffsetDateTime,
        used_before: OffsetDateTime,
    ) -> Result<u64, StoreError>;

    /// `cutoff` より前に予定されたイベントを状態に関係なく削除
    async fn delete_old_intake_events(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError>;
}
