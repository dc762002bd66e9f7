use sqlx::PgPool;
use uuid::Uuid;

use crate::models::ActiveSchedule;

/// リマインダー・スケジュールが共に有効（かつリマインダー未削除）の行のみ対象
const ACTIVE_SCHEDULE_SELECT: &str = r#"
    SELECT s.id AS schedule_id,
           s.medication_reminder_id,
           r.user_id,
           s.ingestion_time_minutes,
           s.days_of_week_bitmask
    FROM medication_schedules s
    JOIN medication_reminders r ON r.id = s.medication_reminder_id
    WHERE s.is_active = true
      AND r.is_active = true
      AND r.deleted_at IS NULL
"#;

#[derive(Clone)]
pub struct MedicationScheduleRepository {
    pool: PgPool,
}

impl MedicationScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_all_active(&self) -> Result<Vec<ActiveSchedule>, sqlx::Error> {
        let sql = format!("{ACTIVE_SCHEDULE_SELECT} ORDER BY s.id");
        sqlx::query_as::<_, ActiveSchedule>(&sql)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_active_by_reminder(
        &self,
        reminder_id: Uuid,
    ) -> Result<Vec<ActiveSchedule>, sqlx::Error> {
        let sql = format!("{ACTIVE_SCHEDULE_SELECT} AND r.id = $1 ORDER BY s.id");
        sqlx::query_as::<_, ActiveSchedule>(&sql)
            .bind(reminder_id)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn find_active_by_id(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ActiveSchedule>, sqlx::Error> {
        let sql = format!("{ACTIVE_SCHEDULE_SELECT} AND s.id = $1");
        sqlx::query_as::<_, ActiveSchedule>(&sql)
            .bind(schedule_id)
            .fetch_optional(&self.pool)
            .await
    }
}
