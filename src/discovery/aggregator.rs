//! Fan-out over all sources, then normalize and de-duplicate

use std::collections::HashMap;
use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::normalize::normalize;
use crate::{
    Error, Result,
    sources::SourceAdapter,
    types::{CourseKey, CourseRecord, RawCourse},
};

/// A failure collected during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source_id: String,
    pub message: String,
    /// Whether the whole source was lost, not just one record
    pub fatal: bool,
}

/// Result of one discovery run
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    /// Unique courses; sources in configured order, records in stream order
    pub courses: Vec<CourseRecord>,
    pub failures: Vec<SourceFailure>,
    /// Raw records received across all sources
    pub raw_count: usize,
    /// Raw records that could not be normalized
    pub rejected: usize,
    /// Records dropped as duplicates of another
    pub duplicates: usize,
}

/// Everything one adapter produced
#[derive(Debug, Default)]
struct SourceRun {
    records: Vec<RawCourse>,
    failures: Vec<SourceFailure>,
    succeeded: bool,
}

/// Runs source adapters with bounded concurrency
#[derive(Debug, Clone)]
pub struct DiscoveryAggregator {
    max_workers: usize,
    cancel: CancellationToken,
}

impl DiscoveryAggregator {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fetch every source, merge and de-duplicate.
    ///
    /// A failing source only adds to `failures`. Fails with
    /// `NoUsableSources` when there are no adapters or none of them could be
    /// fetched, and with `Cancelled` when cancelled before finishing.
    pub async fn discover_all(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
    ) -> Result<DiscoveryReport> {
        if adapters.is_empty() {
            return Err(Error::NoUsableSources);
        }
        info!(
            "Discovering courses from {} source(s), {} at a time",
            adapters.len(),
            self.max_workers
        );

        let mut runs: Vec<(usize, SourceRun)> = stream::iter(adapters.iter().enumerate())
            .map(|(index, adapter)| async move { (index, self.run_source(adapter.as_ref()).await) })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        if self.cancel.is_cancelled() {
            info!("Discovery cancelled");
            return Err(Error::Cancelled);
        }
        if !runs.iter().any(|(_, run)| run.succeeded) {
            for (_, run) in &runs {
                for failure in &run.failures {
                    warn!("{}: {}", failure.source_id, failure.message);
                }
            }
            return Err(Error::NoUsableSources);
        }

        // Completion order is arbitrary; merge in configured order
        runs.sort_by_key(|(index, _)| *index);
        let report = merge(runs.into_iter().map(|(_, run)| run));
        info!(
            "Discovered {} unique course(s) from {} raw record(s) ({} duplicate, {} rejected, {} failure(s))",
            report.courses.len(),
            report.raw_count,
            report.duplicates,
            report.rejected,
            report.failures.len()
        );
        Ok(report)
    }

    async fn run_source(&self, adapter: &dyn SourceAdapter) -> SourceRun {
        let mut run = SourceRun::default();
        let id = adapter.id().to_string();
        if self.cancel.is_cancelled() {
            return run;
        }

        let mut items = match adapter.fetch().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Source {} failed: {}", id, e);
                run.failures.push(failure(&id, &e, true));
                return run;
            }
        };
        run.succeeded = true;

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = items.next() => next,
            };
            match next {
                Some(Ok(raw)) => run.records.push(raw),
                Some(Err(e)) => {
                    debug!("Source {} record failed: {}", id, e);
                    run.failures.push(failure(&id, &e, false));
                }
                None => break,
            }
        }

        info!("Source {} yielded {} record(s)", id, run.records.len());
        run
    }
}

fn failure(source_id: &str, error: &Error, fatal: bool) -> SourceFailure {
    let message = match error {
        Error::Source { message, .. } => message.clone(),
        other => other.to_string(),
    };
    SourceFailure {
        source_id: source_id.to_string(),
        message,
        fatal,
    }
}

/// Normalize and de-duplicate; on a key collision the more recently
/// discovered record replaces the earlier one in place
fn merge(runs: impl IntoIterator<Item = SourceRun>) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    let mut positions: HashMap<CourseKey, usize> = HashMap::new();

    for run in runs {
        report.failures.extend(run.failures);
        for raw in run.records {
            report.raw_count += 1;
            let record = match normalize(raw) {
                Ok(record) => record,
                Err(e) => {
                    debug!("Rejected record: {}", e);
                    report.rejected += 1;
                    continue;
                }
            };

            match positions.get(&record.key()) {
                Some(&at) => {
                    report.duplicates += 1;
                    if record.discovered_at > report.courses[at].discovered_at {
                        report.courses[at] = record;
                    }
                }
                None => {
                    positions.insert(record.key(), report.courses.len());
                    report.courses.push(record);
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::FixedSource;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn raw(source: &str, title: &str, slug: &str, minutes: i64) -> RawCourse {
        let base = Utc.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();
        RawCourse::new(
            source,
            title,
            format!("https://www.udemy.com/course/{}/?couponCode=C", slug),
        )
        .discovered_at(base + Duration::minutes(minutes))
    }

    fn arc(source: FixedSource) -> Arc<dyn SourceAdapter> {
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_duplicate_keeps_newer_timestamp() {
        let older = raw("a", "Rust Basics", "rust-basics", 0);
        let newer = raw("b", "rust  basics", "rust-basics", 30);
        let expected_at = newer.discovered_at;

        let report = DiscoveryAggregator::new(2)
            .discover_all(&[
                arc(FixedSource::new("a", vec![older])),
                arc(FixedSource::new("b", vec![newer])),
            ])
            .await
            .unwrap();

        assert_eq!(report.courses.len(), 1);
        assert_eq!(report.courses[0].discovered_at, expected_at);
        assert_eq!(report.courses[0].source_id, "b");
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_older_duplicate_does_not_replace() {
        let report = DiscoveryAggregator::new(1)
            .discover_all(&[
                arc(FixedSource::new("a", vec![raw("a", "Go", "go", 10)])),
                arc(FixedSource::new("b", vec![raw("b", "Go", "go", 5)])),
            ])
            .await
            .unwrap();
        assert_eq!(report.courses.len(), 1);
        assert_eq!(report.courses[0].source_id, "a");
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let report = DiscoveryAggregator::new(4)
            .discover_all(&[
                arc(FixedSource::failing("down", "connection refused")),
                arc(FixedSource::new(
                    "up",
                    vec![
                        raw("up", "Go", "go", 0),
                        RawCourse::new("up", "Home", "https://www.udemy.com/"),
                    ],
                )),
            ])
            .await
            .unwrap();

        assert_eq!(report.courses.len(), 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(
            report.failures,
            vec![SourceFailure {
                source_id: "down".to_string(),
                message: "connection refused".to_string(),
                fatal: true,
            }]
        );
    }

    #[tokio::test]
    async fn test_all_sources_failing_escalates() {
        let err = DiscoveryAggregator::new(2)
            .discover_all(&[
                arc(FixedSource::failing("a", "down")),
                arc(FixedSource::failing("b", "down")),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoUsableSources));

        let err = DiscoveryAggregator::new(2).discover_all(&[]).await.unwrap_err();
        assert!(matches!(err, Error::NoUsableSources));
    }

    #[tokio::test]
    async fn test_output_follows_source_order() {
        let report = DiscoveryAggregator::new(3)
            .discover_all(&[
                arc(FixedSource::new("a", vec![raw("a", "A1", "a1", 0), raw("a", "A2", "a2", 0)])),
                arc(FixedSource::new("b", vec![raw("b", "B1", "b1", 0)])),
                arc(FixedSource::new("c", vec![raw("c", "C1", "c1", 0)])),
            ])
            .await
            .unwrap();
        let ids: Vec<_> = report
            .courses
            .iter()
            .map(|c| c.provider_course_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "c1"]);
    }

    #[tokio::test]
    async fn test_cancelled_discovery() {
        let token = CancellationToken::new();
        token.cancel();
        let err = DiscoveryAggregator::new(1)
            .with_cancellation(token)
            .discover_all(&[arc(FixedSource::new("a", vec![raw("a", "A", "a", 0)]))])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
