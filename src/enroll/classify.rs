//! Map platform responses onto the enrollment outcome taxonomy

use std::time::Duration;

use crate::{session::ApiResponse, types::EnrollmentStatus};

const ALREADY_ENROLLED_MARKERS: &[&str] =
    &["already enrolled", "already_enrolled", "already subscribed"];
const EXPIRED_MARKERS: &[&str] = &[
    "coupon has expired",
    "coupon is expired",
    "coupon is not valid",
    "invalid coupon",
    "coupon code is invalid",
    "no longer available",
    "\"is_free\":false",
];
const AUTH_MARKERS: &[&str] = &[
    "authentication credentials were not provided",
    "not logged in",
    "login required",
    "session expired",
];
const COURSE_MARKERS: &[&str] = &["\"_class\":\"course\"", "\"_class\": \"course\""];

/// What the executor does with one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Terminal for this course
    Done(EnrollmentStatus, Option<String>),
    /// Worth retrying with backoff
    Transient(String),
    /// Wait for the longer rate-limit delay, then retry
    RateLimited(Option<Duration>),
}

/// Classify by status first, body markers second
pub fn classify(response: &ApiResponse) -> Verdict {
    let body = response.body.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| body.contains(m));

    if has(ALREADY_ENROLLED_MARKERS) {
        return Verdict::Done(EnrollmentStatus::AlreadyEnrolled, None);
    }

    match response.status {
        200..=299 if has(COURSE_MARKERS) && !has(EXPIRED_MARKERS) => {
            Verdict::Done(EnrollmentStatus::Enrolled, None)
        }
        200..=299 if has(EXPIRED_MARKERS) => done(EnrollmentStatus::ExpiredCoupon, response),
        200..=299 => done(EnrollmentStatus::UnknownError, response),
        401 => done(EnrollmentStatus::AuthFailed, response),
        403 if has(AUTH_MARKERS) => done(EnrollmentStatus::AuthFailed, response),
        403 | 404 | 410 => done(EnrollmentStatus::ExpiredCoupon, response),
        400 if has(EXPIRED_MARKERS) => done(EnrollmentStatus::ExpiredCoupon, response),
        429 => Verdict::RateLimited(response.retry_after),
        408 | 500..=599 => Verdict::Transient(format!("status {}", response.status)),
        _ => done(EnrollmentStatus::UnknownError, response),
    }
}

fn done(status: EnrollmentStatus, response: &ApiResponse) -> Verdict {
    Verdict::Done(status, Some(detail(response)))
}

/// `status N: <first line of the body>`, clipped
fn detail(response: &ApiResponse) -> String {
    let snippet: String = response
        .body
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(120)
        .collect();
    if snippet.is_empty() {
        format!("status {}", response.status)
    } else {
        format!("status {}: {}", response.status, snippet)
    }
}
