pub mod health;
pub mod intake_event;
pub mod resync;

pub use health::health_check;
pub use intake_event::mark_taken;
pub use resync::{resync_reminder, resync_schedule};
