pub mod intake_event;
pub mod medication_schedule;

pub use intake_event::{IntakeEvent, IntakeEventScope, IntakeStatus, NewIntakeEvent};
pub use medication_schedule::ActiveSchedule;
