pub mod config;
pub mod contracts;
mod cycle;
pub mod health;
pub mod registry;
mod state;

pub use cycle::CycleReport;
pub use registry::{RegionRunner, SchedulerRegistry, TriggerOutcome};
pub use state::CycleState;
