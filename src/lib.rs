//! Coupon Enroller
//!
//! Discovers free course coupons from listing sites, signs in to the course
//! platform by reusing an installed browser's session (or a credential
//! exchange) and enrolls the account, interactively or from a daily job.
//!
//! # Architecture
//!
//! Two independent paths meet at the enrollment step:
//! - **Auth path**: [`browser`] detects installed browsers and the OS default,
//!   [`cookies`] extracts platform cookies from the chosen browser's store,
//!   [`session`] turns them into a validated platform session
//! - **Discovery path**: [`sources`] fetch raw listings, [`discovery`] merges
//!   and de-duplicates them, [`filter`] selects and orders them
//!
//! [`enroll`] then walks the selected courses against the validated session,
//! and [`jobs`] bundles the whole thing for a scheduler.
//!
//! # Usage
//!
//! ```bash
//! coupon-enroller browsers
//! coupon-enroller discover --json
//! coupon-enroller daily --browser firefox
//! ```
//!
//! # Examples
//!
//! ```rust,no_run
//! use coupon_enroller::{
//!     DiscoveryAggregator, FilterEngine, Settings, sources::configured_sources,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::default();
//! let sources = configured_sources(&settings.discovery)?;
//! let report = DiscoveryAggregator::new(settings.discovery.max_workers)
//!     .discover_all(&sources)
//!     .await?;
//! let picked = FilterEngine::apply(&report.courses, &settings.daily_filter);
//! println!("{} of {} courses match", picked.len(), report.courses.len());
//! # Ok(())
//! # }
//! ```

pub mod browser;
pub mod cli;
pub mod config;
pub mod cookies;
pub mod discovery;
pub mod enroll;
pub mod error;
pub mod filter;
pub mod jobs;
pub mod session;
pub mod sources;
pub mod types;
pub mod utils;

pub use browser::BrowserRegistry;
pub use config::Settings;
pub use discovery::{DiscoveryAggregator, DiscoveryReport};
pub use enroll::{EnrollmentExecutor, RateLimitPolicy};
pub use error::{AuthFailure, Error, Result};
pub use filter::{FilterEngine, FilterSpec};
pub use jobs::{DailyJob, DailyJobReport};
pub use session::{SessionManager, ValidatedSession};
pub use types::{CourseRecord, EnrollmentOutcome, EnrollmentStatus};
