pub mod intake_event;
pub mod medication_schedule;
pub mod password_reset_token;
pub mod user;

pub use intake_event::IntakeEventRepository;
pub use medication_schedule::MedicationScheduleRepository;
pub use password_reset_token::PasswordResetTokenRepository;
pub use user::UserRepository;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{ActiveSchedule, IntakeEvent, IntakeEventScope, IntakeStatus, NewIntakeEvent};
use crate::store::Store;

/// PostgreSQL による [`Store`] 実装
///
/// エンティティごとのリポジトリに委譲し、`sqlx::Error` を `StoreError` に変換する
#[derive(Clone)]
pub struct PgStore {
    user_repo: UserRepository,
    schedule_repo: MedicationScheduleRepository,
    intake_event_repo: IntakeEventRepository,
    token_repo: PasswordResetTokenRepository,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            user_repo: UserRepository::new(pool.clone()),
            schedule_repo: MedicationScheduleRepository::new(pool.clone()),
            intake_event_repo: IntakeEventRepository::new(pool.clone()),
            token_repo: PasswordResetTokenRepository::new(pool),
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_active_schedules_with_active_reminder(
        &self,
    ) -> Result<Vec<ActiveSchedule>, StoreError> {
        Ok(self.schedule_repo.find_all_active().await?)
    }

    async fn find_active_schedules_for_reminder(
        &self,
        reminder_id: Uuid,
    ) -> Result<Vec<ActiveSchedule>, StoreError> {
        Ok(self.schedule_repo.find_active_by_reminder(reminder_id).await?)
    }

    async fn find_active_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ActiveSchedule>, StoreError> {
        Ok(self.schedule_repo.find_active_by_id(schedule_id).await?)
    }

    async fn find_user_timezone(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.user_repo.find_timezone(user_id).await?)
    }

    async fn find_intake_event(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        scheduled_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, StoreError> {
        Ok(self
            .intake_event_repo
            .find_by_dedup_key(user_id, schedule_id, scheduled_at)
            .await?)
    }

    async fn create_intake_event(&self, event: NewIntakeEvent) -> Result<IntakeEvent, StoreError> {
        Ok(self.intake_event_repo.create(&event).await?)
    }

    async fn delete_future_untaken_intake_events(
        &self,
        scope: IntakeEventScope,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        Ok(self
            .intake_event_repo
            .delete_future_untaken(scope, now)
            .await?)
    }

    async fn find_pending_intake_events_in_window(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<IntakeEvent>, StoreError> {
        Ok(self
            .intake_event_repo
            .find_pending_in_window(from, to, limit)
            .await?)
    }

    async fn update_intake_event_status(
        &self,
        id: Uuid,
        status: IntakeStatus,
    ) -> Result<bool, StoreError> {
        Ok(self
            .intake_event_repo
            .update_pending_status(id, status)
            .await?)
    }

    async fn increment_intake_event_attempts(&self, id: Uuid) -> Result<(), StoreError> {
        Ok(self.intake_event_repo.increment_attempts(id).await?)
    }

    async fn mark_intake_event_taken(
        &self,
        id: Uuid,
        taken_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, StoreError> {
        Ok(self.intake_event_repo.mark_taken(id, taken_at).await?)
    }

    async fn delete_expired_or_used_reset_tokens(
        &self,
        now: OffsetDateTime,
        used_before: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        Ok(self
            .token_repo
            .delete_expired_or_used(now, used_before)
            .await?)
    }

    async fn delete_old_intake_events(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        Ok(self.intake_event_repo.delete_scheduled_before(cutoff).await?)
    }
}
