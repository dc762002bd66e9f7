use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::{IntakeEvent, IntakeEventScope, IntakeStatus, NewIntakeEvent};

#[derive(Clone)]
pub struct IntakeEventRepository {
    pool: PgPool,
}

impl IntakeEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_dedup_key(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        scheduled_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, sqlx::Error> {
        sqlx::query_as::<_, IntakeEvent>(
            r#"
            SELECT id, user_id, medication_reminder_id, medication_schedule_id,
                   scheduled_at, status, attempts, taken_at
            FROM intake_events
            WHERE user_id = $1
              AND medication_schedule_id = $2
              AND scheduled_at = $3
            "#,
        )
        .bind(user_id)
        .bind(schedule_id)
        .bind(scheduled_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// 新しい服薬イベントを作成
    ///
    /// # Errors
    /// - UNIQUE制約違反時: `sqlx::Error::Database` (constraint = "intake_events_dedup_key")
    ///   `StoreError::from` で `StoreError::Conflict` に変換される
    pub async fn create(&self, event: &NewIntakeEvent) -> Result<IntakeEvent, sqlx::Error> {
        sqlx::query_as::<_, IntakeEvent>(
            r#"
            INSERT INTO intake_events
                (user_id, medication_reminder_id, medication_schedule_id, scheduled_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, medication_reminder_id, medication_schedule_id,
                      scheduled_at, status, attempts, taken_at
            "#,
        )
        .bind(event.user_id)
        .bind(event.medication_reminder_id)
        .bind(event.medication_schedule_id)
        .bind(event.scheduled_at)
        .fetch_one(&self.pool)
        .await
    }

    /// `now` 以降の未服用イベントを削除
    ///
    /// # Returns
    /// 削除された行数
    pub async fn delete_future_untaken(
        &self,
        scope: IntakeEventScope,
        now: OffsetDateTime,
    ) -> Result<u64, sqlx::Error> {
        let (column, id) = match scope {
            IntakeEventScope::Reminder(id) => ("medication_reminder_id", id),
            IntakeEventScope::Schedule(id) => ("medication_schedule_id", id),
        };
        let sql = format!(
            r#"
            DELETE FROM intake_events
            WHERE {column} = $1
              AND scheduled_at >= $2
              AND status <> 'TAKEN'
            "#
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// 予定時刻の古い順に PENDING イベントを取得
    pub async fn find_pending_in_window(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<IntakeEvent>, sqlx::Error> {
        sqlx::query_as::<_, IntakeEvent>(
            r#"
            SELECT id, user_id, medication_reminder_id, medication_schedule_id,
                   scheduled_at, status, attempts, taken_at
            FROM intake_events
            WHERE status = 'PENDING'
              AND scheduled_at >= $1
              AND scheduled_at <= $2
            ORDER BY scheduled_at ASC
            LIMIT $3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    /// PENDING のイベントのみ状態を更新
    ///
    /// # Returns
    /// 更新された場合は true
    pub async fn update_pending_status(
        &self,
        id: Uuid,
        status: IntakeStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE intake_events
            SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_attempts(&self, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE intake_events
            SET attempts = attempts + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 服用済みにマーク
    ///
    /// # Returns
    /// 存在しない、または既に服用済みの場合は None
    pub async fn mark_taken(
        &self,
        id: Uuid,
        taken_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, sqlx::Error> {
        sqlx::query_as::<_, IntakeEvent>(
            r#"
            UPDATE intake_events
            SET status = 'TAKEN', taken_at = $2, updated_at = NOW()
            WHERE id = $1 AND status <> 'TAKEN'
            RETURNING id, user_id, medication_reminder_id, medication_schedule_id,
                      scheduled_at, status, attempts, taken_at
            "#,
        )
        .bind(id)
        .bind(taken_at)
        .fetch_optional(&self.pool)
        .await
    }

    /// `cutoff` より前に予定されたイベントを削除
    pub async fn delete_scheduled_before(&self, cutoff: OffsetDateTime) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM intake_events
            WHERE scheduled_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
