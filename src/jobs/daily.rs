//! The scheduled discover -> filter -> enroll job
//!
//! The scheduler owns timing and notifications; it calls [`DailyJob::run`]
//! and gets back a [`DailyJobReport`] it can render however it likes.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    Result,
    config::Settings,
    discovery::{DiscoveryAggregator, SourceFailure},
    enroll::{EnrollmentExecutor, RateLimitPolicy},
    filter::{FilterEngine, FilterSpec},
    session::ValidatedSession,
    sources::SourceAdapter,
    types::{CourseRecord, EnrollmentOutcome},
};

/// What one daily run did
#[derive(Debug, Clone, Serialize)]
pub struct DailyJobReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Unique courses discovered
    pub discovered: usize,
    /// Courses left after the filter
    pub matched: usize,
    /// Matched courses skipped because the account already owns them
    pub already_owned: usize,
    pub failures: Vec<SourceFailure>,
    pub outcomes: Vec<EnrollmentOutcome>,
    /// Outcome count per status name
    pub tallies: BTreeMap<String, usize>,
}

impl DailyJobReport {
    pub fn enrolled(&self) -> usize {
        self.tallies.get("enrolled").copied().unwrap_or(0)
    }

    /// One line for a notification
    pub fn summary(&self) -> String {
        let counts = self
            .tallies
            .iter()
            .map(|(status, count)| format!("{} {}", count, status))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{} discovered, {} matched, {} attempted{}{}",
            self.discovered,
            self.matched,
            self.outcomes.len(),
            if counts.is_empty() { "" } else { ": " },
            counts
        )
    }
}

/// Count outcomes per status
pub fn tally(outcomes: &[EnrollmentOutcome]) -> BTreeMap<String, usize> {
    let mut tallies = BTreeMap::new();
    for outcome in outcomes {
        *tallies.entry(outcome.status.to_string()).or_insert(0) += 1;
    }
    tallies
}

/// Discover, filter and enroll in at most `limit` new courses
#[derive(Debug, Clone)]
pub struct DailyJob {
    aggregator: DiscoveryAggregator,
    executor: EnrollmentExecutor,
    policy: RateLimitPolicy,
    limit: usize,
}

impl DailyJob {
    pub fn new(settings: &Settings) -> Self {
        Self {
            aggregator: DiscoveryAggregator::new(settings.discovery.max_workers),
            executor: EnrollmentExecutor::new(),
            policy: RateLimitPolicy::from(&settings.enrollment),
            limit: settings.enrollment.daily_limit,
        }
    }

    pub fn with_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.aggregator = self.aggregator.with_cancellation(token.clone());
        self.executor = self.executor.with_cancellation(token);
        self
    }

    /// Run once.
    ///
    /// Only discovery escalations (no usable sources, cancellation) fail the
    /// job; everything else ends up in the report.
    pub async fn run(
        &self,
        session: &ValidatedSession,
        sources: &[Arc<dyn SourceAdapter>],
        spec: &FilterSpec,
    ) -> Result<DailyJobReport> {
        let started_at = Utc::now();
        info!("Daily job started");

        let discovery = self.aggregator.discover_all(sources).await?;
        let matched = FilterEngine::apply(&discovery.courses, spec);

        let mut selected: Vec<CourseRecord> = Vec::new();
        let mut already_owned = 0;
        for course in &matched {
            if selected.len() >= self.limit {
                break;
            }
            if course.is_expired() {
                continue;
            }
            if session.is_enrolled(&course.provider_course_id).await {
                already_owned += 1;
                continue;
            }
            selected.push(course.clone());
        }
        info!(
            "{} course(s) matched the filter, enrolling in {}",
            matched.len(),
            selected.len()
        );

        let outcomes = self.executor.enroll(session, &selected, &self.policy).await;
        let report = DailyJobReport {
            started_at,
            finished_at: Utc::now(),
            discovered: discovery.courses.len(),
            matched: matched.len(),
            already_owned,
            failures: discovery.failures,
            tallies: tally(&outcomes),
            outcomes,
        };
        info!("Daily job finished: {}", report.summary());
        Ok(report)
    }
}
