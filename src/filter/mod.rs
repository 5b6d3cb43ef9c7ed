//! Declarative course filtering
//!
//! A [`FilterSpec`] is a plain value (usually loaded from the config file);
//! [`FilterEngine`] applies it without touching the input collection.

pub mod engine;
pub mod spec;

pub use engine::{FilterEngine, FilterStatistics};
pub use spec::{FilterSpec, SortDirection, SortKey, SortSpec};
