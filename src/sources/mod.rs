//! Course listing sources
//!
//! Each external listing site gets one [`SourceAdapter`]. An adapter knows
//! its site's request shape and markup and nothing else, so a site redesign
//! touches exactly one file here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::{Result, config::DiscoverySettings, types::RawCourse, utils::version};

pub mod discudemy;
pub mod fixed;
pub mod real_discount;

pub use discudemy::DiscudemySource;
pub use fixed::FixedSource;
pub use real_discount::RealDiscountSource;

/// Lazy, single-pass sequence of raw records.
///
/// An `Err` item is a per-record failure; the stream may continue after it.
pub type RawCourseStream = BoxStream<'static, Result<RawCourse>>;

/// One external listing source
#[async_trait]
pub trait SourceAdapter: Send + Sync + std::fmt::Debug {
    /// Stable identifier recorded on every record (`real.discount`, ...)
    fn id(&self) -> &str;

    /// Start one pass over the source.
    ///
    /// Fails with `Error::Source` when the site is unreachable or its
    /// response cannot be understood at all.
    async fn fetch(&self) -> Result<RawCourseStream>;
}

/// Shared HTTP client for listing sites
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(format!(
            "Mozilla/5.0 (compatible; {})",
            version::user_agent_product()
        ))
        .build()?)
}

/// Adapters enabled in `settings`, in a fixed order
pub fn configured_sources(settings: &DiscoverySettings) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let mut sources: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    if settings.real_discount.enabled {
        sources.push(Arc::new(RealDiscountSource::new(
            &settings.real_discount,
            settings.request_timeout(),
        )?));
    }
    if settings.discudemy.enabled {
        sources.push(Arc::new(DiscudemySource::new(
            &settings.discudemy,
            settings.request_timeout(),
        )?));
    }
    Ok(sources)
}
