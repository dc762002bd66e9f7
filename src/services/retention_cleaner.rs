use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::config::RetentionPolicy;
use crate::error::AppError;
use crate::store::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    pub removed_reset_tokens: u64,
    pub removed_intake_events: u64,
}

/// 保持期間を過ぎたデータの削除
#[derive(Clone)]
pub struct RetentionCleaner {
    store: Arc<dyn Store>,
    policy: RetentionPolicy,
}

impl RetentionCleaner {
    pub fn new(store: Arc<dyn Store>, policy: RetentionPolicy) -> Self {
        Self { store, policy }
    }

    /// 期限切れ・使用済みのリセットトークンと古い服薬イベントを削除
    pub async fn run_cleanup(&self, now: OffsetDateTime) -> Result<CleanupSummary, AppError> {
        let removed_reset_tokens = self
            .store
            .delete_expired_or_used_reset_tokens(now, now - self.policy.used_reset_token_retention)
            .await?;
        let removed_intake_events = self
            .store
            .delete_old_intake_events(now - self.policy.intake_event_retention)
            .await?;

        tracing::info!(
            removed_reset_tokens,
            removed_intake_events,
            "保持期間切れデータ削除完了"
        );

        Ok(CleanupSummary {
            removed_reset_tokens,
            removed_intake_events,
        })
    }
}
