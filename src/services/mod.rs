pub mod alarm_processor;
pub mod intake_event_generator;
pub mod notification;
pub mod retention_cleaner;
pub mod scheduler;
pub mod timezone;

pub use alarm_processor::{AlarmProcessor, AlarmRunSummary};
pub use intake_event_generator::{GenerationSummary, IntakeEventGenerator, ResyncSummary};
pub use notification::{
    LogNotificationProvider, NotificationProvider, SosMessage, WebhookNotificationProvider,
};
pub use retention_cleaner::{CleanupSummary, RetentionCleaner};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use timezone::TimezoneResolver;
