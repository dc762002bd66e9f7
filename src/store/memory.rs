//! テスト用のインメモリ Store
//!
//! PostgreSQL 実装と同じ一意キーと更新条件を再現する

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::Store;
use crate::error::StoreError;
use crate::models::{ActiveSchedule, IntakeEvent, IntakeEventScope, IntakeStatus, NewIntakeEvent};

struct ReminderRow {
    user_id: Uuid,
    is_active: bool,
}

struct ScheduleRow {
    reminder_id: Uuid,
    ingestion_time_minutes: i32,
    days_of_week_bitmask: i32,
    is_active: bool,
}

struct ResetTokenRow {
    id: Uuid,
    expires_at: OffsetDateTime,
    used_at: Option<OffsetDateTime>,
}

impl ResetTokenRow {
    /// 期限切れ、または `used_before` より前に使用済み
    fn is_purgeable(&self, now: OffsetDateTime, used_before: OffsetDateTime) -> bool {
        self.expires_at < now || self.used_at.is_some_and(|used| used < used_before)
    }
}

fn in_scope(scope: IntakeEventScope, event: &IntakeEvent) -> bool {
    match scope {
        IntakeEventScope::Reminder(id) => event.medication_reminder_id == id,
        IntakeEventScope::Schedule(id) => event.medication_schedule_id == Some(id),
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, Option<String>>,
    reminders: HashMap<Uuid, ReminderRow>,
    schedules: HashMap<Uuid, ScheduleRow>,
    events: Vec<IntakeEvent>,
    tokens: Vec<ResetTokenRow>,
    hide_existing_on_lookup: bool,
    fail_creates: bool,
    fail_status_updates: bool,
    take_before_status_update: bool,
    fail_attempt_increments: bool,
}

impl Inner {
    fn active_schedule(&self, schedule_id: Uuid) -> Option<ActiveSchedule> {
        let schedule = self.schedules.get(&schedule_id)?;
        let reminder = self.reminders.get(&schedule.reminder_id)?;
        (schedule.is_active && reminder.is_active).then(|| ActiveSchedule {
            schedule_id,
            medication_reminder_id: schedule.reminder_id,
            user_id: reminder.user_id,
            ingestion_time_minutes: schedule.ingestion_time_minutes,
            days_of_week_bitmask: schedule.days_of_week_bitmask,
        })
    }

    fn active_schedules(&self) -> Vec<ActiveSchedule> {
        let mut schedules: Vec<_> = self
            .schedules
            .keys()
            .filter_map(|id| self.active_schedule(*id))
            .collect();
        schedules.sort_by_key(|s| s.schedule_id);
        schedules
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, timezone: Option<&str>) -> Uuid {
        let id = Uuid::new_v4();
        self.inner
            .lock()
            .unwrap()
            .users
            .insert(id, timezone.map(str::to_string));
        id
    }

    pub fn add_reminder(&self, user_id: Uuid) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().reminders.insert(
            id,
            ReminderRow {
                user_id,
                is_active: true,
            },
        );
        id
    }

    pub fn add_schedule(
        &self,
        reminder_id: Uuid,
        ingestion_time_minutes: i32,
        days_of_week_bitmask: i32,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().schedules.insert(
            id,
            ScheduleRow {
                reminder_id,
                ingestion_time_minutes,
                days_of_week_bitmask,
                is_active: true,
            },
        );
        id
    }

    pub fn set_reminder_active(&self, reminder_id: Uuid, is_active: bool) {
        if let Some(r) = self.inner.lock().unwrap().reminders.get_mut(&reminder_id) {
            r.is_active = is_active;
        }
    }

    pub fn set_schedule_time(&self, schedule_id: Uuid, ingestion_time_minutes: i32) {
        if let Some(s) = self.inner.lock().unwrap().schedules.get_mut(&schedule_id) {
            s.ingestion_time_minutes = ingestion_time_minutes;
        }
    }

    pub fn insert_event(&self, event: IntakeEvent) {
        self.inner.lock().unwrap().events.push(event);
    }

    pub fn events(&self) -> Vec<IntakeEvent> {
        let mut events = self.inner.lock().unwrap().events.clone();
        events.sort_by_key(|e| e.scheduled_at);
        events
    }

    pub fn event(&self, id: Uuid) -> Option<IntakeEvent> {
        self.inner
            .lock()
            .unwrap()
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn add_reset_token(
        &self,
        expires_at: OffsetDateTime,
        used_at: Option<OffsetDateTime>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.lock().unwrap().tokens.push(ResetTokenRow {
            id,
            expires_at,
            used_at,
        });
        id
    }

    pub fn reset_token_ids(&self) -> Vec<Uuid> {
        self.inner
            .lock()
            .unwrap()
            .tokens
            .iter()
            .map(|t| t.id)
            .collect()
    }

    /// 既存イベントの検索結果を常に None にする（並行実行で検索と作成の間に割り込まれた状況）
    pub fn hide_existing_on_lookup(&self) {
        self.inner.lock().unwrap().hide_existing_on_lookup = true;
    }

    pub fn fail_creates(&self) {
        self.inner.lock().unwrap().fail_creates = true;
    }

    pub fn fail_status_updates(&self) {
        self.inner.lock().unwrap().fail_status_updates = true;
    }

    /// 状態更新の直前に TAKEN にする（検索後に服薬記録が割り込んだ状況）
    pub fn take_before_status_update(&self) {
        self.inner.lock().unwrap().take_before_status_update = true;
    }

    pub fn fail_attempt_increments(&self) {
        self.inner.lock().unwrap().fail_attempt_increments = true;
    }
}

/// 擬似的なインフラ障害
fn unavailable() -> StoreError {
    StoreError::Database(sqlx::Error::PoolTimedOut)
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_active_schedules_with_active_reminder(
        &self,
    ) -> Result<Vec<ActiveSchedule>, StoreError> {
        Ok(self.inner.lock().unwrap().active_schedules())
    }

    async fn find_active_schedules_for_reminder(
        &self,
        reminder_id: Uuid,
    ) -> Result<Vec<ActiveSchedule>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .active_schedules()
            .into_iter()
            .filter(|s| s.medication_reminder_id == reminder_id)
            .collect())
    }

    async fn find_active_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<ActiveSchedule>, StoreError> {
        Ok(self.inner.lock().unwrap().active_schedule(schedule_id))
    }

    async fn find_user_timezone(&self, user_id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .users
            .get(&user_id)
            .cloned()
            .flatten())
    }

    async fn find_intake_event(
        &self,
        user_id: Uuid,
        schedule_id: Uuid,
        scheduled_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if inner.hide_existing_on_lookup {
            return Ok(None);
        }
        Ok(inner
            .events
            .iter()
            .find(|e| {
                e.user_id == user_id
                    && e.medication_schedule_id == Some(schedule_id)
                    && e.scheduled_at == scheduled_at
            })
            .cloned())
    }

    async fn create_intake_event(&self, event: NewIntakeEvent) -> Result<IntakeEvent, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_creates {
            return Err(unavailable());
        }
        let duplicate = inner.events.iter().any(|e| {
            e.user_id == event.user_id
                && e.medication_schedule_id == Some(event.medication_schedule_id)
                && e.scheduled_at == event.scheduled_at
        });
        if duplicate {
            return Err(StoreError::Conflict);
        }
        let created = IntakeEvent {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            medication_reminder_id: event.medication_reminder_id,
            medication_schedule_id: Some(event.medication_schedule_id),
            scheduled_at: event.scheduled_at,
            status: IntakeStatus::Pending,
            attempts: 0,
            taken_at: None,
        };
        inner.events.push(created.clone());
        Ok(created)
    }

    async fn delete_future_untaken_intake_events(
        &self,
        scope: IntakeEventScope,
        now: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.events.len();
        inner.events.retain(|e| {
            !(in_scope(scope, e) && e.scheduled_at >= now && e.status != IntakeStatus::Taken)
        });
        Ok((before - inner.events.len()) as u64)
    }

    async fn find_pending_intake_events_in_window(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<IntakeEvent>, StoreError> {
        let mut pending: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| {
                e.status == IntakeStatus::Pending && e.scheduled_at >= from && e.scheduled_at <= to
            })
            .cloned()
            .collect();
        pending.sort_by_key(|e| e.scheduled_at);
        pending.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(pending)
    }

    async fn update_intake_event_status(
        &self,
        id: Uuid,
        status: IntakeStatus,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_status_updates {
            return Err(unavailable());
        }
        if inner.take_before_status_update
            && let Some(event) = inner.events.iter_mut().find(|e| e.id == id)
        {
            event.status = IntakeStatus::Taken;
        }
        match inner
            .events
            .iter_mut()
            .find(|e| e.id == id && e.status == IntakeStatus::Pending)
        {
            Some(event) => {
                event.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn increment_intake_event_attempts(&self, id: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_attempt_increments {
            return Err(unavailable());
        }
        if let Some(event) = inner.events.iter_mut().find(|e| e.id == id) {
            event.attempts += 1;
        }
        Ok(())
    }

    async fn mark_intake_event_taken(
        &self,
        id: Uuid,
        taken_at: OffsetDateTime,
    ) -> Result<Option<IntakeEvent>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .events
            .iter_mut()
            .find(|e| e.id == id && e.status != IntakeStatus::Taken)
            .map(|event| {
                event.status = IntakeStatus::Taken;
                event.taken_at = Some(taken_at);
                event.clone()
            }))
    }

    async fn delete_expired_or_used_reset_tokens(
        &self,
        now: OffsetDateTime,
        used_before: OffsetDateTime,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.tokens.len();
        inner
            .tokens
            .retain(|t| !t.is_purgeable(now, used_before));
        Ok((before - inner.tokens.len()) as u64)
    }

    async fn delete_old_intake_events(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.events.len();
        inner.events.retain(|e| e.scheduled_at >= cutoff);
        Ok((before - inner.events.len()) as u64)
    }
}
