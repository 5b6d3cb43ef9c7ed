//! Enrollment outcome types

use serde::{Deserialize, Serialize};

use super::course::CourseRecord;

/// Result classification for one enrollment attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolled,
    AlreadyEnrolled,
    ExpiredCoupon,
    RateLimited,
    AuthFailed,
    UnknownError,
    /// Not attempted because the run was cancelled first
    Cancelled,
}

impl EnrollmentStatus {
    /// Whether the account now owns the course
    pub fn is_success(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Enrolled | EnrollmentStatus::AlreadyEnrolled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolled => "enrolled",
            EnrollmentStatus::AlreadyEnrolled => "already_enrolled",
            EnrollmentStatus::ExpiredCoupon => "expired_coupon",
            EnrollmentStatus::RateLimited => "rate_limited",
            EnrollmentStatus::AuthFailed => "auth_failed",
            EnrollmentStatus::UnknownError => "unknown_error",
            EnrollmentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-course enrollment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentOutcome {
    pub title: String,
    pub url: String,
    pub provider_course_id: String,
    pub status: EnrollmentStatus,
    /// Human-readable explanation
    pub detail: Option<String>,
}

impl EnrollmentOutcome {
    /// Create an outcome for a course
    pub fn new(course: &CourseRecord, status: EnrollmentStatus) -> Self {
        Self {
            title: course.title.clone(),
            url: course.url.clone(),
            provider_course_id: course.provider_course_id.clone(),
            status,
            detail: None,
        }
    }

    /// Attach a detail message
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&EnrollmentStatus::AlreadyEnrolled).unwrap();
        assert_eq!(json, "\"already_enrolled\"");
        assert_eq!(EnrollmentStatus::ExpiredCoupon.to_string(), "expired_coupon");
    }

    #[test]
    fn test_success_statuses() {
        assert!(EnrollmentStatus::Enrolled.is_success());
        assert!(EnrollmentStatus::AlreadyEnrolled.is_success());
        assert!(!EnrollmentStatus::ExpiredCoupon.is_success());
        assert!(!EnrollmentStatus::AuthFailed.is_success());
    }
}
