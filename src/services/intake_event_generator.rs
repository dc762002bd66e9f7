use std::sync::Arc;

use chrono_tz::Tz;
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{AppError, StoreError};
use crate::models::{ActiveSchedule, IntakeEventScope, NewIntakeEvent};
use crate::services::timezone::{TimezoneResolver, upcoming_occurrences};
use crate::store::Store;

/// 生成対象の先読み期間
const GENERATION_HORIZON: Duration = Duration::days(1);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GenerationSummary {
    pub created: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResyncSummary {
    pub deleted: u64,
    pub created: u64,
}

/// 服薬イベント生成サービス
///
/// 有効なスケジュールを `[now, now + 1日]` の服薬イベントに展開する。
/// 何度実行しても同じ結果になる（既存イベントには触れず、一意制約違反は無視する）
#[derive(Clone)]
pub struct IntakeEventGenerator {
    store: Arc<dyn Store>,
    default_tz: Tz,
}

impl IntakeEventGenerator {
    pub fn new(store: Arc<dyn Store>, default_tz: Tz) -> Self {
        Self { store, default_tz }
    }

    /// 全スケジュールの今後のイベントを生成（定期ジョブ）
    pub async fn generate_upcoming_intake_events(
        &self,
        now: OffsetDateTime,
    ) -> Result<GenerationSummary, AppError> {
        let schedules = self
            .store
            .find_active_schedules_with_active_reminder()
            .await?;
        let created = self.generate_for(&schedules, now).await?;

        if created > 0 {
            tracing::info!(created, schedules = schedules.len(), "服薬イベント生成完了");
        } else {
            tracing::debug!(schedules = schedules.len(), "新規服薬イベントなし");
        }

        Ok(GenerationSummary { created })
    }

    /// 指定リマインダーの今後のイベントを生成
    pub async fn generate_upcoming_events_for_reminder(
        &self,
        reminder_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<GenerationSummary, AppError> {
        let schedules = self
            .store
            .find_active_schedules_for_reminder(reminder_id)
            .await?;
        let created = self.generate_for(&schedules, now).await?;
        Ok(GenerationSummary { created })
    }

    /// 指定スケジュールの今後のイベントを生成
    pub async fn generate_upcoming_events_for_schedule(
        &self,
        schedule_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<GenerationSummary, AppError> {
        let schedules: Vec<_> = self
            .store
            .find_active_schedule(schedule_id)
            .await?
            .into_iter()
            .collect();
        let created = self.generate_for(&schedules, now).await?;
        Ok(GenerationSummary { created })
    }

    /// リマインダーの再同期
    ///
    /// 未来の未服用イベントを削除してから再生成する。
    /// リマインダーが無効・削除済みなら削除のみ行う
    pub async fn resync_upcoming_events_for_reminder(
        &self,
        reminder_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<ResyncSummary, AppError> {
        let deleted = self
            .store
            .delete_future_untaken_intake_events(IntakeEventScope::Reminder(reminder_id), now)
            .await?;
        let GenerationSummary { created } = self
            .generate_upcoming_events_for_reminder(reminder_id, now)
            .await?;

        tracing::info!(reminder_id = %reminder_id, deleted, created, "リマインダー再同期完了");

        Ok(ResyncSummary { deleted, created })
    }

    /// スケジュールの再同期（スケジュールの作成・更新・削除時）
    pub async fn resync_upcoming_events_for_schedule(
        &self,
        schedule_id: Uuid,
        now: OffsetDateTime,
    ) -> Result<ResyncSummary, AppError> {
        let deleted = self
            .store
            .delete_future_untaken_intake_events(IntakeEventScope::Schedule(schedule_id), now)
            .await?;
        let GenerationSummary { created } = self
            .generate_upcoming_events_for_schedule(schedule_id, now)
            .await?;

        tracing::info!(schedule_id = %schedule_id, deleted, created, "スケジュール再同期完了");

        Ok(ResyncSummary { deleted, created })
    }

    async fn generate_for(
        &self,
        schedules: &[ActiveSchedule],
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let horizon = now + GENERATION_HORIZON;
        let mut resolver = TimezoneResolver::new(self.store.as_ref(), self.default_tz);
        let mut created = 0;

        for schedule in schedules {
            if !schedule.is_well_formed() {
                tracing::warn!(
                    schedule_id = %schedule.schedule_id,
                    ingestion_time_minutes = schedule.ingestion_time_minutes,
                    days_of_week_bitmask = schedule.days_of_week_bitmask,
                    "不正なスケジュール（スキップ）"
                );
                continue;
            }

            let tz = resolver.resolve(schedule.user_id).await?;
            for scheduled_at in upcoming_occurrences(schedule, tz, now, horizon) {
                if self.ensure_event(schedule, scheduled_at).await? {
                    created += 1;
                }
            }
        }

        Ok(created)
    }

    /// イベントが無ければ作成
    ///
    /// # Returns
    /// 新規作成した場合は true
    async fn ensure_event(
        &self,
        schedule: &ActiveSchedule,
        scheduled_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let existing = self
            .store
            .find_intake_event(schedule.user_id, schedule.schedule_id, scheduled_at)
            .await?;
        if existing.is_some() {
            return Ok(false);
        }

        let event = NewIntakeEvent {
            user_id: schedule.user_id,
            medication_reminder_id: schedule.medication_reminder_id,
            medication_schedule_id: schedule.schedule_id,
            scheduled_at,
        };

        match self.store.create_intake_event(event).await {
            Ok(created) => {
                tracing::debug!(
                    intake_event_id = %created.id,
                    schedule_id = %schedule.schedule_id,
                    scheduled_at = %scheduled_at,
                    "服薬イベント作成"
                );
                Ok(true)
            }
            // 並行実行中の別プロセスが先に作成した
            Err(StoreError::Conflict) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
