//! Multi-source course discovery
//!
//! [`DiscoveryAggregator`] fans out to every configured
//! [`SourceAdapter`](crate::sources::SourceAdapter) with a bounded worker
//! count, normalizes what comes back and de-duplicates by
//! (normalized title, course slug).

pub mod aggregator;
pub mod normalize;

pub use aggregator::{DiscoveryAggregator, DiscoveryReport, SourceFailure};
pub use normalize::{normalize, normalize_title};
