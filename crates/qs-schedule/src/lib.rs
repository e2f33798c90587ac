//! Quality Studio Schedule: recurring report delivery
//!
//! - [`rule`]: recurrence rules (`ScheduleSpec`) and their validation
//! - [`recurrence`]: next-occurrence computation on a fixed-offset clock
//! - [`schedule`]: schedules and the active/paused lifecycle
//! - [`coordinator`]: polling, compare-and-set firing and delivery hand-off
//! - [`delivery_log`]: bounded record of delivery attempts
//!
//! # Example
//!
//! ```
//! use qs_schedule::{DayOfWeek, NewSchedule, ReportFormat, Schedule, ScheduleSpec, TimeOfDay};
//!
//! let now = "2026-10-14T10:00:00Z".parse().unwrap(); // a Wednesday
//! let schedule = Schedule::create(
//!     NewSchedule {
//!         report_name: "Weekly Quality Summary".to_string(),
//!         schedule: ScheduleSpec::weekly(DayOfWeek::Monday, TimeOfDay::new(8, 0).unwrap()),
//!         recipients: vec!["qa@plant.example".to_string()],
//!         format: ReportFormat::Pdf,
//!     },
//!     now,
//! )
//! .unwrap();
//!
//! assert_eq!(schedule.next_run.to_rfc3339(), "2026-10-19T08:00:00+00:00");
//! assert_eq!(schedule.describe(), "Every monday at 08:00");
//! ```

pub mod coordinator;
pub mod delivery_log;
pub mod recurrence;
pub mod rule;
pub mod schedule;

pub use coordinator::{
    due_schedules, set_schedule_active, CatchUpPolicy, CoordinatorConfig, DeliveryCoordinator,
    DeliveryReceipt, PollSummary, RenderedReport, ReportDelivery, ReportRenderer, ScheduleStore,
};
pub use delivery_log::{
    DeliveryEntry, DeliveryLog, DeliveryOutcome, DeliveryStats, DEFAULT_LOG_CAPACITY,
};
pub use recurrence::{compute_next_occurrence, days_in_month, upcoming};
pub use rule::{DayOfWeek, Frequency, ScheduleSpec, TimeOfDay, MAX_UTC_OFFSET_MINUTES};
pub use schedule::{parse_recipients, NewSchedule, ReportFormat, Schedule, ScheduleState};
