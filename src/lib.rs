//! Household chore rotation: who does which chore each month, who got it
//! done, and how everyone did.

pub mod auth;
pub mod clock;
pub mod error;
pub mod models;
pub mod report;
pub mod rotation;
pub mod scheduler;
pub mod settings;
pub mod store;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Result, RotaError};
pub use models::{MonthlyReport, Period, Task, TaskHistoryEntry, TaskSummary, User, UserStatus};
pub use report::ReportAggregator;
pub use rotation::{compute_assignments, Assignment, Rotation};
pub use scheduler::{Scheduler, SchedulerConfig, TickOutcome};
pub use settings::Settings;
pub use store::TaskStore;
