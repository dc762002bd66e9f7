use std::collections::HashMap;

use chrono::{DateTime, Datelike, Days, LocalResult, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::ActiveSchedule;
use crate::store::Store;

/// 今日と明日の2日分を展開する
const LOOKAHEAD_DAYS: u64 = 1;

/// ユーザーID → タイムゾーンの解決
///
/// キャッシュは1回の生成処理の間だけ保持する（処理をまたいで使い回さない）
pub struct TimezoneResolver<'a> {
    store: &'a dyn Store,
    default_tz: Tz,
    cache: HashMap<Uuid, Tz>,
}

impl<'a> TimezoneResolver<'a> {
    pub fn new(store: &'a dyn Store, default_tz: Tz) -> Self {
        Self {
            store,
            default_tz,
            cache: HashMap::new(),
        }
    }

    /// ユーザーのタイムゾーンを解決
    ///
    /// 未設定・不正な値の場合はデフォルトタイムゾーンを返す
    pub async fn resolve(&mut self, user_id: Uuid) -> Result<Tz, StoreError> {
        if let Some(tz) = self.cache.get(&user_id) {
            return Ok(*tz);
        }

        let tz = match self.store.find_user_timezone(user_id).await? {
            Some(name) => name.parse::<Tz>().unwrap_or_else(|_| {
                tracing::warn!(user_id = %user_id, timezone = %name, "不明なタイムゾーン（デフォルトを使用）");
                self.default_tz
            }),
            None => self.default_tz,
        };

        self.cache.insert(user_id, tz);
        Ok(tz)
    }
}

/// スケジュールの `[now, horizon]` 内の発生時刻（UTC）を列挙
///
/// - ローカル日付の今日・明日について `ingestion_time_minutes` の時刻を候補とする
/// - 曜日ビットマスクに含まれない日は除外
/// - 今日の候補が現在時刻より前なら除外
/// - 夏時間で重複する時刻は早い方、存在しない時刻は1時間後に寄せる
pub fn upcoming_occurrences(
    schedule: &ActiveSchedule,
    tz: Tz,
    now: OffsetDateTime,
    horizon: OffsetDateTime,
) -> Vec<OffsetDateTime> {
    let Some(now_utc) = DateTime::<Utc>::from_timestamp(now.unix_timestamp(), now.nanosecond())
    else {
        return Vec::new();
    };
    let minutes = schedule.ingestion_time_minutes;
    let Some(time_of_day) = NaiveTime::from_hms_opt((minutes / 60) as u32, (minutes % 60) as u32, 0)
    else {
        return Vec::new();
    };

    let local_now = now_utc.with_timezone(&tz);
    let today = local_now.date_naive();

    (0..=LOOKAHEAD_DAYS)
        .filter_map(|offset| {
            let date = today.checked_add_days(Days::new(offset))?;
            if !schedule.includes_weekday(date.weekday().num_days_from_sunday()) {
                return None;
            }

            let candidate = date.and_time(time_of_day);
            if offset == 0 && candidate < local_now.naive_local() {
                return None;
            }

            let scheduled_at = local_to_utc(tz, candidate)?;
            // 夏時間終了の重複時間帯では早い方の時刻が既に過ぎていることがある
            if offset == 0 && scheduled_at < now {
                return None;
            }
            (scheduled_at <= horizon).then_some(scheduled_at)
        })
        .collect()
}

/// ローカル日時をその日付のオフセットで UTC に変換
fn local_to_utc(tz: Tz, local: NaiveDateTime) -> Option<OffsetDateTime> {
    let resolved = match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => tz
            .from_local_datetime(&(local + TimeDelta::hours(1)))
            .earliest()?,
    };
    OffsetDateTime::from_unix_timestamp(resolved.timestamp()).ok()
}
