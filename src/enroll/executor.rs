//! Sequential, paced enrollment over one validated session

use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classify::{Verdict, classify};
use super::policy::RateLimitPolicy;
use crate::{
    Error,
    session::ValidatedSession,
    types::{CourseRecord, EnrollmentOutcome, EnrollmentStatus},
};

/// Runs enrollment calls one at a time against a single session
#[derive(Debug, Clone, Default)]
pub struct EnrollmentExecutor {
    cancel: CancellationToken,
}

impl EnrollmentExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe `token` between courses and during every wait
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Enroll in `courses` in order.
    ///
    /// Always returns exactly one outcome per input course, in input order.
    /// After an authentication failure the session is invalidated and every
    /// remaining course is reported `auth_failed` without another call.
    pub async fn enroll(
        &self,
        session: &ValidatedSession,
        courses: &[CourseRecord],
        policy: &RateLimitPolicy,
    ) -> Vec<EnrollmentOutcome> {
        info!("Enrolling in {} course(s)", courses.len());
        let mut outcomes = Vec::with_capacity(courses.len());
        let pacer = Pacer::new(session, policy.min_delay);

        for (index, course) in courses.iter().enumerate() {
            let rest = &courses[index..];

            if self.cancel.is_cancelled() {
                info!("Enrollment cancelled with {} course(s) left", rest.len());
                outcomes.extend(skip_all(rest, EnrollmentStatus::Cancelled, "run cancelled"));
                break;
            }
            if !session.is_active().await {
                outcomes.extend(skip_all(
                    rest,
                    EnrollmentStatus::AuthFailed,
                    "session is no longer valid",
                ));
                break;
            }
            if session.is_enrolled(&course.provider_course_id).await {
                debug!("Already own {}", course.provider_course_id);
                outcomes.push(
                    EnrollmentOutcome::new(course, EnrollmentStatus::AlreadyEnrolled)
                        .with_detail("course already owned by this account"),
                );
                continue;
            }

            let outcome = self.enroll_one(session, course, policy, &pacer).await;
            info!("{}: {}", course.title, outcome.status);

            match outcome.status {
                EnrollmentStatus::Enrolled | EnrollmentStatus::AlreadyEnrolled => {
                    session.mark_enrolled(course.provider_course_id.clone()).await;
                    outcomes.push(outcome);
                }
                EnrollmentStatus::AuthFailed => {
                    let reason = outcome
                        .detail
                        .clone()
                        .unwrap_or_else(|| "authentication failed".to_string());
                    session.invalidate(reason).await;
                    outcomes.push(outcome);
                    outcomes.extend(skip_all(
                        &rest[1..],
                        EnrollmentStatus::AuthFailed,
                        "skipped after the session was rejected",
                    ));
                    break;
                }
                EnrollmentStatus::Cancelled => {
                    outcomes.push(outcome);
                    outcomes.extend(skip_all(&rest[1..], EnrollmentStatus::Cancelled, "run cancelled"));
                    break;
                }
                _ => outcomes.push(outcome),
            }
        }

        outcomes
    }

    /// One course: call, classify, retry transient failures and rate limits
    async fn enroll_one(
        &self,
        session: &ValidatedSession,
        course: &CourseRecord,
        policy: &RateLimitPolicy,
        pacer: &Pacer<'_>,
    ) -> EnrollmentOutcome {
        let mut retries = 0u32;
        let mut rate_limit_waits = 0u32;

        loop {
            if !pacer.ready(&self.cancel).await {
                return EnrollmentOutcome::new(course, EnrollmentStatus::Cancelled)
                    .with_detail("run cancelled");
            }

            let result = session.api().enroll(course).await;
            pacer.stamp().await;
            let verdict = match result {
                Ok(response) => classify(&response),
                Err(e) => verdict_for_error(&e),
            };

            let wait = match verdict {
                Verdict::Done(status, detail) => {
                    let outcome = EnrollmentOutcome::new(course, status);
                    return match detail {
                        Some(detail) => outcome.with_detail(detail),
                        None => outcome,
                    };
                }
                Verdict::Transient(reason) => {
                    if retries >= policy.max_retries {
                        return EnrollmentOutcome::new(course, EnrollmentStatus::UnknownError)
                            .with_detail(format!("gave up after {} retries: {}", retries, reason));
                    }
                    let delay = policy.backoff(retries);
                    retries += 1;
                    warn!(
                        "Transient failure for {} ({}), retry {} in {:?}",
                        course.provider_course_id, reason, retries, delay
                    );
                    delay
                }
                Verdict::RateLimited(retry_after) => {
                    if rate_limit_waits >= policy.max_rate_limit_retries {
                        return EnrollmentOutcome::new(course, EnrollmentStatus::RateLimited)
                            .with_detail("platform kept rate limiting");
                    }
                    rate_limit_waits += 1;
                    let delay = retry_after
                        .map_or(policy.rate_limited_delay, |after| {
                            after.max(policy.rate_limited_delay)
                        });
                    warn!("Rate limited, waiting {:?}", delay);
                    delay
                }
            };

            if !self.sleep(wait).await {
                return EnrollmentOutcome::new(course, EnrollmentStatus::Cancelled)
                    .with_detail("run cancelled");
            }
        }
    }

    /// False when cancelled before the delay elapsed
    async fn sleep(&self, delay: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Enforces the minimum gap between one call finishing and the next starting.
///
/// The last-call time lives on the session, so the gap holds across
/// separate `enroll` calls and executors sharing that session.
#[derive(Debug)]
struct Pacer<'a> {
    session: &'a ValidatedSession,
    min_delay: Duration,
}

impl<'a> Pacer<'a> {
    fn new(session: &'a ValidatedSession, min_delay: Duration) -> Self {
        Self { session, min_delay }
    }

    /// Wait out the remaining gap; false when cancelled
    async fn ready(&self, cancel: &CancellationToken) -> bool {
        let Some(last) = self.session.last_call().await else {
            return true;
        };
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep_until(last + self.min_delay) => true,
        }
    }

    async fn stamp(&self) {
        self.session.stamp_call().await;
    }
}

fn verdict_for_error(error: &Error) -> Verdict {
    match error {
        Error::RateLimited { retry_after } => Verdict::RateLimited(*retry_after),
        e if e.is_retryable() => Verdict::Transient(e.to_string()),
        Error::Auth { .. } => Verdict::Done(EnrollmentStatus::AuthFailed, Some(error.to_string())),
        Error::Cancelled => Verdict::Done(EnrollmentStatus::Cancelled, None),
        _ => Verdict::Done(EnrollmentStatus::UnknownError, Some(error.to_string())),
    }
}

fn skip_all<'a>(
    courses: &'a [CourseRecord],
    status: EnrollmentStatus,
    detail: &'a str,
) -> impl Iterator<Item = EnrollmentOutcome> + 'a {
    courses
        .iter()
        .map(move |course| EnrollmentOutcome::new(course, status).with_detail(detail))
}
