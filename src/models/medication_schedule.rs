use sqlx::FromRow;
use uuid::Uuid;

/// 1日の分数（0〜1439 が有効）
pub const MINUTES_PER_DAY: i32 = 24 * 60;

/// 曜日ビットマスクの最大値（日曜=bit0 〜 土曜=bit6）
pub const MAX_DAYS_OF_WEEK_BITMASK: i32 = 0b111_1111;

/// 有効なリマインダーに属する有効なスケジュール
///
/// medication_schedules と medication_reminders の JOIN 結果
#[derive(Debug, Clone, FromRow)]
pub struct ActiveSchedule {
    pub schedule_id: Uuid,
    pub medication_reminder_id: Uuid,
    pub user_id: Uuid,
    /// ローカル時刻の0時からの経過分
    pub ingestion_time_minutes: i32,
    /// 0 は毎日
    pub days_of_week_bitmask: i32,
}

impl ActiveSchedule {
    /// 値が範囲内か検証
    pub fn is_well_formed(&self) -> bool {
        (0..MINUTES_PER_DAY).contains(&self.ingestion_time_minutes)
            && (0..=MAX_DAYS_OF_WEEK_BITMASK).contains(&self.days_of_week_bitmask)
    }

    /// 指定曜日（0=日曜）が対象か
    pub fn includes_weekday(&self, weekday_from_sunday: u32) -> bool {
        self.days_of_week_bitmask == 0 || self.days_of_week_bitmask & (1 << weekday_from_sunday) != 0
    }
}
