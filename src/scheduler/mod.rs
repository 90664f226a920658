pub mod driver;
pub mod refresh;

pub use driver::{background_cycle, run_foreign, run_once, spawn_background};
pub use refresh::{EnsureOutcome, RefreshScheduler, SchedulerSettings};
