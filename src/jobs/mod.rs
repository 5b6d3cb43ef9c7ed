//! Composite jobs invoked by an external scheduler

pub mod daily;

pub use daily::{DailyJob, DailyJobReport, tally};
