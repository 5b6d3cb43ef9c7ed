//! Course listing types
//!
//! [`RawCourse`] is what a source adapter yields; [`CourseRecord`] is the
//! canonical, normalized form everything downstream consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unnormalized listing as scraped from one source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCourse {
    /// Identifier of the adapter that produced the record
    pub source_id: String,
    /// Title as shown by the source
    pub title: String,
    /// Provider URL, possibly carrying the coupon as a query parameter
    pub url: String,
    /// Coupon code when the source lists it separately from the URL
    #[serde(default)]
    pub coupon_code: Option<String>,
    /// Rating on whatever scale the source uses (expected 0-5)
    #[serde(default)]
    pub rating: Option<f64>,
    /// Free-form duration text ("5.5 hours", "2h 30m", "90 min")
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub discovered_at: DateTime<Utc>,
    /// Coupon expiry when the source publishes one
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RawCourse {
    /// Create a raw record discovered now
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            url: url.into(),
            coupon_code: None,
            rating: None,
            duration: None,
            language: None,
            tags: Vec::new(),
            discovered_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Set coupon code
    pub fn with_coupon(mut self, coupon: impl Into<String>) -> Self {
        self.coupon_code = Some(coupon.into());
        self
    }

    /// Set rating
    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Set duration text
    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    /// Set language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Add a category tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Override discovery timestamp
    pub fn discovered_at(mut self, at: DateTime<Utc>) -> Self {
        self.discovered_at = at;
        self
    }

    /// Set coupon expiry
    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// De-duplication identity of a course
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CourseKey {
    /// Normalized title
    pub title: String,
    /// Provider's course slug
    pub provider_course_id: String,
}

/// Canonical course listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub title: String,
    /// Canonical provider URL (coupon included when known)
    pub url: String,
    /// Provider course slug, e.g. `python-bootcamp`
    pub provider_course_id: String,
    pub coupon_code: Option<String>,
    pub source_id: String,
    /// 0.0-5.0, `None` when unknown
    pub rating: Option<f64>,
    /// Hours, `None` when unknown
    pub duration_hours: Option<f64>,
    pub language: Option<String>,
    pub tags: Vec<String>,
    pub discovered_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CourseRecord {
    /// The (normalized title, provider course id) identity
    pub fn key(&self) -> CourseKey {
        CourseKey {
            title: crate::discovery::normalize::normalize_title(&self.title),
            provider_course_id: self.provider_course_id.clone(),
        }
    }

    /// Lower-cased title and tags, the haystack keyword filters search
    pub fn searchable_text(&self) -> String {
        let mut text = self.title.to_lowercase();
        for tag in &self.tags {
            text.push(' ');
            text.push_str(&tag.to_lowercase());
        }
        text
    }

    /// Whether the coupon is known to have lapsed
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at < Utc::now())
    }
}
