//! A domestic battery/PV charge-and-export planning engine: forward-simulates
//! a household's load, solar production, and tariff forecast to choose
//! charge and export windows that minimize a cost-plus-risk metric.

pub mod config;
pub mod errors;
pub mod logging;
pub mod metric;
pub mod optimizer;
pub mod orchestrator;
pub mod pool;
pub mod ports;
pub mod postprocess;
pub mod report;
pub mod resample;
pub mod simulator;
pub mod types;
pub mod windows;

pub use orchestrator::{PlanInputs, PlanState, Planner};
pub use postprocess::ManualOverrides;
pub use report::Report;
