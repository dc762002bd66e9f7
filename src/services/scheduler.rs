use std::future::Future;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerIntervals;
use crate::error::AppError;
use crate::services::{AlarmProcessor, IntakeEventGenerator, RetentionCleaner};

/// 定期ジョブの構成
///
/// `start` は self を消費するため、1つの構成から起動できるのは一度だけ
pub struct Scheduler {
    generator: IntakeEventGenerator,
    alarm_processor: AlarmProcessor,
    cleaner: RetentionCleaner,
    intervals: SchedulerIntervals,
}

/// 起動中の定期ジョブ
///
/// `shutdown` で停止する。実行中の処理は完了まで待つ
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Scheduler {
    pub fn new(
        generator: IntakeEventGenerator,
        alarm_processor: AlarmProcessor,
        cleaner: RetentionCleaner,
        intervals: SchedulerIntervals,
    ) -> Self {
        Self {
            generator,
            alarm_processor,
            cleaner,
            intervals,
        }
    }

    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let Self {
            generator,
            alarm_processor,
            cleaner,
            intervals,
        } = self;

        let tasks = vec![
            spawn_periodic(
                "intake_event_generator",
                intervals.generator,
                shutdown_rx.clone(),
                move || {
                    let generator = generator.clone();
                    async move {
                        generator
                            .generate_upcoming_intake_events(OffsetDateTime::now_utc())
                            .await
                            .map(|_| ())
                    }
                },
            ),
            spawn_periodic(
                "alarm_processor",
                intervals.alarm,
                shutdown_rx.clone(),
                move || {
                    let alarm_processor = alarm_processor.clone();
                    async move {
                        alarm_processor
                            .process_pending_alarms(OffsetDateTime::now_utc())
                            .await
                            .map(|_| ())
                    }
                },
            ),
            spawn_periodic(
                "retention_cleaner",
                intervals.cleanup,
                shutdown_rx,
                move || {
                    let cleaner = cleaner.clone();
                    async move {
                        cleaner
                            .run_cleanup(OffsetDateTime::now_utc())
                            .await
                            .map(|_| ())
                    }
                },
            ),
        ];

        tracing::info!(
            generator_secs = intervals.generator.as_secs(),
            alarm_secs = intervals.alarm.as_secs(),
            cleanup_secs = intervals.cleanup.as_secs(),
            "定期ジョブ起動"
        );

        SchedulerHandle { shutdown_tx, tasks }
    }
}

impl SchedulerHandle {
    pub async fn shutdown(self) {
        // 受信側が既に終了していても問題ない
        let _ = self.shutdown_tx.send(true);

        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(job = name, error = ?e, "定期ジョブの停止に失敗");
            }
        }

        tracing::info!("定期ジョブ停止");
    }
}

/// `period` ごとに `job` を実行するタスクを起動
///
/// 1回の処理のエラーや panic はログ出力のみで、次回の実行は継続する
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    job: F,
) -> (&'static str, JoinHandle<()>)
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), AppError>> + Send + 'static,
{
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match tokio::spawn(job()).await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::error!(job = name, error = ?e, "定期ジョブ失敗"),
                        Err(e) => tracing::error!(job = name, error = ?e, "定期ジョブが異常終了"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!(job = name, "定期ジョブ終了");
                        break;
                    }
                }
            }
        }
    });

    (name, handle)
}
