use std::time::Duration as StdDuration;

use chrono_tz::Tz;
use secrecy::SecretBox;
use serde::Deserialize;
use time::Duration;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    // アラーム設定
    #[serde(default = "default_retry_interval_min")]
    pub retry_interval_min: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_mark_missed_after_min")]
    pub mark_missed_after_min: i64,
    #[serde(default = "default_scan_window_hours")]
    pub scan_window_hours: i64,
    #[serde(default = "default_alarm_batch_size")]
    pub alarm_batch_size: i64,

    /// ユーザーのタイムゾーン未設定時に使う IANA タイムゾーン
    #[serde(default = "default_timezone")]
    pub default_timezone: String,

    // 保持期間設定
    #[serde(default = "default_intake_event_retention_days")]
    pub intake_event_retention_days: i64,
    #[serde(default = "default_used_reset_token_retention_days")]
    pub used_reset_token_retention_days: i64,

    // ジョブ実行間隔
    #[serde(default = "default_generator_interval_secs")]
    pub generator_interval_secs: u64,
    #[serde(default = "default_alarm_interval_secs")]
    pub alarm_interval_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    // プッシュ通知ゲートウェイ（オプション - 未設定時はログ出力のみ）
    #[serde(default)]
    pub push_gateway_url: Option<String>,
    pub push_gateway_token: Option<SecretBox<String>>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_RETRY_INTERVAL_MIN: i64 = 15;
const DEFAULT_MAX_ATTEMPTS: i32 = 3;
const DEFAULT_MARK_MISSED_AFTER_MIN: i64 = 45;
const DEFAULT_SCAN_WINDOW_HOURS: i64 = 6;
const DEFAULT_ALARM_BATCH_SIZE: i64 = 500;
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
const DEFAULT_INTAKE_EVENT_RETENTION_DAYS: i64 = 90;
const DEFAULT_USED_RESET_TOKEN_RETENTION_DAYS: i64 = 1;
const DEFAULT_GENERATOR_INTERVAL_SECS: u64 = 5 * 60;
const DEFAULT_ALARM_INTERVAL_SECS: u64 = 60;
const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60 * 60;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_database_max_connections() -> u32 {
    DEFAULT_DATABASE_MAX_CONNECTIONS
}

fn default_retry_interval_min() -> i64 {
    DEFAULT_RETRY_INTERVAL_MIN
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_mark_missed_after_min() -> i64 {
    DEFAULT_MARK_MISSED_AFTER_MIN
}

fn default_scan_window_hours() -> i64 {
    DEFAULT_SCAN_WINDOW_HOURS
}

fn default_alarm_batch_size() -> i64 {
    DEFAULT_ALARM_BATCH_SIZE
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_intake_event_retention_days() -> i64 {
    DEFAULT_INTAKE_EVENT_RETENTION_DAYS
}

fn default_used_reset_token_retention_days() -> i64 {
    DEFAULT_USED_RESET_TOKEN_RETENTION_DAYS
}

fn default_generator_interval_secs() -> u64 {
    DEFAULT_GENERATOR_INTERVAL_SECS
}

fn default_alarm_interval_secs() -> u64 {
    DEFAULT_ALARM_INTERVAL_SECS
}

fn default_cleanup_interval_secs() -> u64 {
    DEFAULT_CLEANUP_INTERVAL_SECS
}

/// 設定値の検証エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("環境変数の読み込みに失敗: {0}")]
    Env(#[from] envy::Error),

    #[error("{name} は正の値である必要があります（実際: {value}）")]
    NotPositive { name: &'static str, value: i64 },

    #[error("{name} は0以上である必要があります（実際: {value}）")]
    Negative { name: &'static str, value: i64 },

    #[error("不明なタイムゾーン: {0}")]
    InvalidTimezone(String),
}

impl Config {
    /// 環境変数から設定を読み込み、検証する
    ///
    /// 不正な値は起動時にエラーとする（ジョブ実行時には検証しない）
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("RETRY_INTERVAL_MIN", self.retry_interval_min)?;
        ensure_positive("MAX_ATTEMPTS", i64::from(self.max_attempts))?;
        ensure_positive("MARK_MISSED_AFTER_MIN", self.mark_missed_after_min)?;
        ensure_positive("SCAN_WINDOW_HOURS", self.scan_window_hours)?;
        ensure_positive("ALARM_BATCH_SIZE", self.alarm_batch_size)?;
        ensure_positive(
            "DATABASE_MAX_CONNECTIONS",
            i64::from(self.database_max_connections),
        )?;
        ensure_non_negative(
            "INTAKE_EVENT_RETENTION_DAYS",
            self.intake_event_retention_days,
        )?;
        ensure_non_negative(
            "USED_RESET_TOKEN_RETENTION_DAYS",
            self.used_reset_token_retention_days,
        )?;
        for (name, secs) in [
            ("GENERATOR_INTERVAL_SECS", self.generator_interval_secs),
            ("ALARM_INTERVAL_SECS", self.alarm_interval_secs),
            ("CLEANUP_INTERVAL_SECS", self.cleanup_interval_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::NotPositive { name, value: 0 });
            }
        }
        self.default_tz()?;
        Ok(())
    }

    /// デフォルトタイムゾーンをパース
    pub fn default_tz(&self) -> Result<Tz, ConfigError> {
        self.default_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.default_timezone.clone()))
    }

    pub fn alarm_policy(&self) -> AlarmPolicy {
        AlarmPolicy {
            retry_interval_min: self.retry_interval_min,
            max_attempts: self.max_attempts,
            mark_missed_after_min: self.mark_missed_after_min,
            scan_window: Duration::hours(self.scan_window_hours),
            batch_size: self.alarm_batch_size,
        }
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            intake_event_retention: Duration::days(self.intake_event_retention_days),
            used_reset_token_retention: Duration::days(self.used_reset_token_retention_days),
        }
    }

    pub fn scheduler_intervals(&self) -> SchedulerIntervals {
        SchedulerIntervals {
            generator: StdDuration::from_secs(self.generator_interval_secs),
            alarm: StdDuration::from_secs(self.alarm_interval_secs),
            cleanup: StdDuration::from_secs(self.cleanup_interval_secs),
        }
    }
}

fn ensure_positive(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if value <= 0 {
        return Err(ConfigError::NotPositive { name, value });
    }
    Ok(())
}

fn ensure_non_negative(name: &'static str, value: i64) -> Result<(), ConfigError> {
    if value < 0 {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(())
}

/// アラーム再送・見逃し判定のしきい値
#[derive(Debug, Clone, Copy)]
pub struct AlarmPolicy {
    pub retry_interval_min: i64,
    pub max_attempts: i32,
    pub mark_missed_after_min: i64,
    pub scan_window: Duration,
    pub batch_size: i64,
}

impl Default for AlarmPolicy {
    fn default() -> Self {
        Self {
            retry_interval_min: DEFAULT_RETRY_INTERVAL_MIN,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            mark_missed_after_min: DEFAULT_MARK_MISSED_AFTER_MIN,
            scan_window: Duration::hours(DEFAULT_SCAN_WINDOW_HOURS),
            batch_size: DEFAULT_ALARM_BATCH_SIZE,
        }
    }
}

/// データ保持期間
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub intake_event_retention: Duration,
    pub used_reset_token_retention: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            intake_event_retention: Duration::days(DEFAULT_INTAKE_EVENT_RETENTION_DAYS),
            used_reset_token_retention: Duration::days(DEFAULT_USED_RESET_TOKEN_RETENTION_DAYS),
        }
    }
}

/// 定期ジョブの実行間隔
#[derive(Debug, Clone, Copy)]
pub struct SchedulerIntervals {
    pub generator: StdDuration,
    pub alarm: StdDuration,
    pub cleanup: StdDuration,
}
