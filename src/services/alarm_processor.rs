use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::AlarmPolicy;
use crate::error::AppError;
use crate::models::{IntakeEvent, IntakeStatus};
use crate::services::notification::NotificationProvider;
use crate::store::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlarmRunSummary {
    pub sent: u64,
    pub missed: u64,
}

/// PENDING イベントに対する判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmDecision {
    MarkMissed,
    Dispatch,
    Wait,
}

impl AlarmPolicy {
    /// 予定時刻からの経過分と送信回数から次の動作を決める
    ///
    /// 再送は予定時刻を基準とした線形バックオフ（`attempts * retry_interval_min` 分後）
    pub fn decide(&self, event: &IntakeEvent, now: OffsetDateTime) -> AlarmDecision {
        let minutes_since = (now - event.scheduled_at).whole_minutes();
        let attempts = i64::from(event.attempts);
        let max_attempts = i64::from(self.max_attempts);

        let exhausted = attempts >= max_attempts
            && minutes_since >= self.retry_interval_min * max_attempts;
        if minutes_since >= self.mark_missed_after_min || exhausted {
            return AlarmDecision::MarkMissed;
        }

        if attempts < max_attempts && minutes_since >= attempts * self.retry_interval_min {
            return AlarmDecision::Dispatch;
        }

        AlarmDecision::Wait
    }
}

/// 服薬アラーム処理サービス
///
/// 直近 `scan_window` の PENDING イベントについてアラーム再送・見逃し判定を行う。
/// 送信回数は送信前に加算し、送信失敗時も戻さない（最大 N 回の送信を優先）
#[derive(Clone)]
pub struct AlarmProcessor {
    store: Arc<dyn Store>,
    notifier: Arc<dyn NotificationProvider>,
    policy: AlarmPolicy,
}

impl AlarmProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        notifier: Arc<dyn NotificationProvider>,
        policy: AlarmPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    pub async fn process_pending_alarms(
        &self,
        now: OffsetDateTime,
    ) -> Result<AlarmRunSummary, AppError> {
        let events = self
            .store
            .find_pending_intake_events_in_window(
                now - self.policy.scan_window,
                now,
                self.policy.batch_size,
            )
            .await?;

        let mut summary = AlarmRunSummary::default();
        for event in &events {
            match self.policy.decide(event, now) {
                AlarmDecision::MarkMissed => {
                    if self.mark_missed(event).await {
                        summary.missed += 1;
                    }
                }
                AlarmDecision::Dispatch => {
                    if self.dispatch(event).await {
                        summary.sent += 1;
                    }
                }
                AlarmDecision::Wait => {}
            }
        }

        if summary.sent > 0 || summary.missed > 0 {
            tracing::info!(
                scanned = events.len(),
                sent = summary.sent,
                missed = summary.missed,
                "服薬アラーム処理完了"
            );
        } else {
            tracing::debug!(scanned = events.len(), "送信対象の服薬アラームなし");
        }

        Ok(summary)
    }

    /// MISSED に遷移
    ///
    /// 更新の競合（既に TAKEN / MISSED）や失敗は無視し、次回の処理に任せる
    async fn mark_missed(&self, event: &IntakeEvent) -> bool {
        match self
            .store
            .update_intake_event_status(event.id, IntakeStatus::Missed)
            .await
        {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(error = ?e, intake_event_id = %event.id, "MISSED への更新に失敗");
                false
            }
        }
    }

    async fn dispatch(&self, event: &IntakeEvent) -> bool {
        if let Err(e) = self.store.increment_intake_event_attempts(event.id).await {
            tracing::warn!(error = ?e, intake_event_id = %event.id, "送信回数の更新に失敗");
            return false;
        }

        match self.notifier.send_alarm(event.user_id, event.id).await {
            Ok(()) => {
                tracing::debug!(
                    intake_event_id = %event.id,
                    attempt = event.attempts + 1,
                    "服薬アラーム送信"
                );
                true
            }
            Err(e) => {
                tracing::warn!(error = ?e, intake_event_id = %event.id, "服薬アラーム送信に失敗");
                false
            }
        }
    }
}
