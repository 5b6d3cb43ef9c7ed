//! Platform client and session tests against a mock HTTP server

mod common;

use std::sync::Arc;

use common::helpers::{epoch, platform_settings};
use coupon_enroller::{
    AuthFailure, EnrollmentExecutor, EnrollmentStatus, RateLimitPolicy, SessionManager,
    cookies::{Cookie, CookieJar},
    discovery::normalize,
    session::SessionState,
    types::{CourseRecord, RawCourse},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, header, method, path, query_param},
};

const ME: &str = "/api-2.0/contexts/me/";
const LOGIN: &str = "/join/login-popup/";

fn logged_in(name: &str) -> serde_json::Value {
    json!({
        "header": {
            "isLoggedIn": true,
            "user": {"id": 99, "display_name": name, "has_business": false}
        }
    })
}

fn cookie_jar(token: &str) -> CookieJar {
    vec![
        Cookie::new(".udemy.com", "access_token", token),
        Cookie::new(".udemy.com", "client_id", "cid"),
    ]
    .into_iter()
    .collect()
}

fn course(slug: &str, coupon: &str) -> CourseRecord {
    normalize(
        RawCourse::new(
            "test",
            format!("Course {}", slug),
            format!("https://www.udemy.com/course/{}/?couponCode={}", slug, coupon),
        )
        .discovered_at(epoch()),
    )
    .unwrap()
}

async fn manager_for(server: &MockServer) -> SessionManager {
    SessionManager::new(platform_settings(&server.uri())).unwrap()
}

#[tokio::test]
async fn test_cookie_session_validates_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(logged_in("Ada")))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("tok-1"), "firefox").unwrap();
    let validated = manager.validate(&session).await.unwrap();

    assert_eq!(validated.identity().display_name, "Ada");
    assert_eq!(validated.identity().user_id, "99");
    // Second validate reuses the identity without another request
    manager.validate(&session).await.unwrap();
}

#[tokio::test]
async fn test_logged_out_cookies_are_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("stale"), "chrome").unwrap();
    let err = manager.validate(&session).await.unwrap_err();

    assert_eq!(err.auth_failure(), Some(AuthFailure::NoBrowserSession));
    assert_eq!(session.state().await.name(), "terminal");
}

#[tokio::test]
async fn test_server_error_leaves_session_unvalidated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("tok"), "edge").unwrap();
    let err = manager.validate(&session).await.unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(session.state().await, SessionState::Unvalidated);
}

#[tokio::test]
async fn test_credential_login_then_validate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "csrftoken=csrf-1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(header("x-csrftoken", "csrf-1"))
        .and(body_string_contains("email=me%40example.com"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "access_token=tok-2; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ME))
        .and(header("authorization", "Bearer tok-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(logged_in("Grace")))
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager
        .from_credentials("me@example.com", "hunter2")
        .await
        .unwrap();
    let validated = manager.validate(&session).await.unwrap();

    assert_eq!(validated.identity().display_name, "Grace");
}

#[tokio::test]
async fn test_rejected_login_is_bad_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LOGIN))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "csrftoken=csrf-1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(400).set_body_string("wrong password"))
        .mount(&server)
        .await;

    let err = manager_for(&server)
        .await
        .from_credentials("me@example.com", "wrong")
        .await
        .unwrap_err();
    assert_eq!(err.auth_failure(), Some(AuthFailure::BadCredentials));
    // The secret never ends up in the message
    assert!(!err.to_string().contains("wrong"));
}

#[tokio::test]
async fn test_enrolled_courses_follow_next_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .respond_with(ResponseTemplate::new(200).set_body_json(logged_in("Ada")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api-2.0/users/me/subscribed-courses/"))
        .and(query_param("page_size", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}/api-2.0/users/me/subscribed-courses/?page=2", server.uri()),
            "results": [{"url": "/course/owned-one/"}, {"url": "/course/owned-two/"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api-2.0/users/me/subscribed-courses/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [{"url": "/course/owned-three/"}]
        })))
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("tok"), "firefox").unwrap();
    let validated = manager.validate(&session).await.unwrap();

    assert_eq!(manager.load_enrolled_courses(&validated).await.unwrap(), 3);
    assert!(validated.is_enrolled("owned-three").await);
}

#[tokio::test]
async fn test_enrolled_courses_never_leave_the_platform() {
    let server = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .respond_with(ResponseTemplate::new(200).set_body_json(logged_in("Ada")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api-2.0/users/me/subscribed-courses/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": format!("{}/api-2.0/users/me/subscribed-courses/?page=2", elsewhere.uri()),
            "results": [{"url": "/course/owned-one/"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&elsewhere)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("tok"), "firefox").unwrap();
    let validated = manager.validate(&session).await.unwrap();

    assert_eq!(manager.load_enrolled_courses(&validated).await.unwrap(), 1);
    assert!(elsewhere.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_enroll_flow_against_platform() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .respond_with(ResponseTemplate::new(200).set_body_json(logged_in("Ada")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/course/rust-fast/"))
        .and(query_param("couponCode", "FREE1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<body data-module-args='{"course":{"id":123,"title":"Rust Fast"}}'></body>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/course/subscribe/"))
        .and(query_param("courseId", "123"))
        .and(query_param("couponCode", "FREE1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api-2.0/users/me/subscribed-courses/123/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"_class": "course", "id": 123})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/course/gone-course/"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("tok"), "firefox").unwrap();
    let validated = manager.validate(&session).await.unwrap();

    let courses = vec![course("rust-fast", "FREE1"), course("gone-course", "OLD")];
    let outcomes = EnrollmentExecutor::new()
        .enroll(&validated, &courses, &RateLimitPolicy::immediate())
        .await;

    let statuses: Vec<_> = outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![EnrollmentStatus::Enrolled, EnrollmentStatus::ExpiredCoupon]
    );
    assert!(validated.is_enrolled("rust-fast").await);
}

#[tokio::test]
async fn test_rejected_session_stops_enrollment() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME))
        .respond_with(ResponseTemplate::new(200).set_body_json(logged_in("Ada")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/course/first/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let manager = manager_for(&server).await;
    let session = manager.from_cookies(cookie_jar("tok"), "firefox").unwrap();
    let validated = manager.validate(&session).await.unwrap();

    let courses = vec![course("first", "A"), course("second", "B")];
    let outcomes = EnrollmentExecutor::new()
        .enroll(&validated, &courses, &RateLimitPolicy::immediate())
        .await;

    assert!(
        outcomes
            .iter()
            .all(|o| o.status == EnrollmentStatus::AuthFailed)
    );
    assert!(!validated.is_active().await);
}
