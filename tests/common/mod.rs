//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

/// Test helper functions
pub mod helpers {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use coupon_enroller::{
        Result, SessionManager, ValidatedSession,
        config::PlatformSettings,
        session::{ApiResponse, EnrolledPage, Identity, PlatformApi, SessionAuth},
        sources::{FixedSource, SourceAdapter},
        types::{CourseRecord, RawCourse},
    };

    /// Fixed reference time so orderings are reproducible
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    /// Raw listing number `i`: rating cycles 3.5..5.0, duration 1..7 hours
    pub fn numbered_course(source_id: &str, i: usize) -> RawCourse {
        RawCourse::new(
            source_id,
            format!("Course {:02}", i),
            format!("https://www.udemy.com/course/course-{:02}/", i),
        )
        .with_coupon(format!("C{:02}", i))
        .with_rating(3.5 + (i % 4) as f64 * 0.5)
        .with_duration(format!("{} hours", i % 7 + 1))
        .with_language("English")
        .discovered_at(epoch() + Duration::minutes(i as i64))
    }

    pub fn fixed_source(id: &str, range: std::ops::Range<usize>) -> Arc<dyn SourceAdapter> {
        let records = range.map(|i| numbered_course(id, i)).collect();
        Arc::new(FixedSource::new(id, records))
    }

    /// Platform double that accepts every enrollment and records the order
    #[derive(Debug, Default)]
    pub struct RecordingPlatform {
        pub owned: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingPlatform {
        pub fn owning(slugs: &[&str]) -> Self {
            Self {
                owned: slugs.iter().map(|s| s.to_string()).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlatformApi for RecordingPlatform {
        async fn current_identity(&self) -> Result<Option<Identity>> {
            Ok(Some(Identity {
                user_id: "1".to_string(),
                display_name: "Test Account".to_string(),
                flags: Default::default(),
            }))
        }

        async fn enrolled_courses(&self, _cursor: Option<&str>) -> Result<EnrolledPage> {
            Ok(EnrolledPage {
                slugs: self.owned.clone(),
                next: None,
            })
        }

        async fn enroll(&self, course: &CourseRecord) -> Result<ApiResponse> {
            self.calls
                .lock()
                .unwrap()
                .push(course.provider_course_id.clone());
            Ok(ApiResponse::new(200, r#"{"_class":"course","id":1}"#))
        }
    }

    /// Validated session over `api`, with owned courses preloaded
    pub async fn validated_session(api: Arc<RecordingPlatform>) -> ValidatedSession {
        let manager = SessionManager::new(PlatformSettings::default()).unwrap();
        let session = manager.from_api(
            SessionAuth::BrowserCookies {
                browser: "firefox".to_string(),
                cookie_count: 1,
            },
            api,
        );
        let validated = manager.validate(&session).await.unwrap();
        manager.load_enrolled_courses(&validated).await.unwrap();
        validated
    }

    /// Platform settings pointed at a mock server
    pub fn platform_settings(base_url: &str) -> PlatformSettings {
        PlatformSettings {
            base_url: base_url.to_string(),
            ..PlatformSettings::default()
        }
    }
}
