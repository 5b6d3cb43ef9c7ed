//! # Session Management Module
//!
//! The [`SessionManager`] turns either a browser [`CookieJar`] or an
//! identifier/secret pair into a [`Session`], validates it with one round
//! trip to the platform and hands out a [`ValidatedSession`] for enrollment.
//!
//! ## Lifecycle
//!
//! - `from_cookies` / `from_credentials` build an unvalidated session
//! - `validate` confirms the identity (one request); auth failures make the
//!   session terminal, transport failures leave it unvalidated for a retry
//! - `invalidate` forces the terminal state after the platform stops
//!   accepting the session mid-run
//!
//! ## Examples
//!
//! ```rust,no_run
//! use coupon_enroller::config::Settings;
//! use coupon_enroller::cookies::{Cookie, CookieJar};
//! use coupon_enroller::session::SessionManager;
//!
//! # tokio_test::block_on(async {
//! let manager = SessionManager::new(Settings::default().platform)?;
//!
//! let jar: CookieJar = vec![Cookie::new(".udemy.com", "access_token", "...")]
//!     .into_iter()
//!     .collect();
//! let session = manager.from_cookies(jar, "chrome")?;
//! let validated = manager.validate(&session).await?;
//! println!("Logged in as {}", validated.identity().display_name);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, info, warn};

use super::platform::{PlatformApi, PlatformClient};
use super::state::{Session, SessionAuth, SessionState, ValidatedSession};
use crate::{AuthFailure, Error, Result, config::PlatformSettings, cookies::CookieJar};

/// Upper bound on subscribed-course pages walked in one preload
const MAX_ENROLLED_PAGES: usize = 200;

/// Builds and validates platform sessions
#[derive(Debug, Clone)]
pub struct SessionManager {
    settings: Arc<PlatformSettings>,
    base_url: url::Url,
}

impl SessionManager {
    /// Creates a new session manager for the configured platform
    pub fn new(settings: PlatformSettings) -> Result<Self> {
        let base_url = url::Url::parse(&settings.base_url)?;
        Ok(Self {
            settings: Arc::new(settings),
            base_url,
        })
    }

    pub fn settings(&self) -> &PlatformSettings {
        &self.settings
    }

    /// Session reusing browser cookies.
    ///
    /// The jar is consumed; its cookies live only inside the session's HTTP
    /// client from here on.
    pub fn from_cookies(&self, jar: CookieJar, browser: impl Into<String>) -> Result<Arc<Session>> {
        if jar.is_empty() {
            return Err(Error::auth(
                AuthFailure::NoBrowserSession,
                "cookie jar is empty",
            ));
        }

        let store = Arc::new(Jar::default());
        jar.load_into(&store, &self.base_url);
        let bearer = jar.get("access_token").map(|c| c.value.clone());

        let client = PlatformClient::new(&self.settings, store, bearer.as_deref())?;
        let auth = SessionAuth::BrowserCookies {
            browser: browser.into(),
            cookie_count: jar.len(),
        };
        debug!("Built cookie session from {} cookie(s)", jar.len());

        Ok(Session::new(auth, Arc::new(client)))
    }

    /// Session from an identifier/secret exchange.
    ///
    /// Empty or whitespace-only input is rejected before anything is sent.
    /// The secret is used for the login request only and never stored.
    pub async fn from_credentials(&self, identifier: &str, secret: &str) -> Result<Arc<Session>> {
        let identifier = identifier.trim();
        if identifier.is_empty() || secret.trim().is_empty() {
            return Err(Error::auth(
                AuthFailure::MalformedInput,
                "identifier and secret must both be non-empty",
            ));
        }

        info!("Logging in as {}", identifier);
        let store = Arc::new(Jar::default());
        let login_client = PlatformClient::new(&self.settings, store.clone(), None)?;
        login_client.login(identifier, secret).await?;

        let bearer = login_client.cookie("access_token");
        let client = PlatformClient::new(&self.settings, store, bearer.as_deref())?;
        let auth = SessionAuth::Credentials {
            identifier: identifier.to_string(),
        };

        Ok(Session::new(auth, Arc::new(client)))
    }

    /// Session over a caller-provided platform implementation
    pub fn from_api(&self, auth: SessionAuth, api: Arc<dyn PlatformApi>) -> Arc<Session> {
        Session::new(auth, api)
    }

    /// Confirm the session resolves to a logged-in identity.
    ///
    /// Holds the session's state lock for the whole round trip, so
    /// concurrent validate/invalidate calls are serialised. A session that
    /// already validated returns its existing identity without a request.
    pub async fn validate(&self, session: &Arc<Session>) -> Result<ValidatedSession> {
        let mut state = session.lock_state().await;

        match &*state {
            SessionState::Validated(identity) => {
                return Ok(ValidatedSession::new(session.clone(), identity.clone()));
            }
            SessionState::Terminal { reason } => {
                return Err(Error::auth(AuthFailure::SessionExpired, reason.clone()));
            }
            SessionState::Unvalidated => {}
        }

        // Transport errors propagate and leave the session unvalidated
        let identity = session.api().current_identity().await?;

        match identity {
            Some(identity) => {
                *state = SessionState::Validated(identity.clone());
                Ok(ValidatedSession::new(session.clone(), identity))
            }
            None => {
                let (kind, reason) = match session.auth() {
                    SessionAuth::BrowserCookies { browser, .. } => (
                        AuthFailure::NoBrowserSession,
                        format!("{} cookies are not logged in to the platform", browser),
                    ),
                    SessionAuth::Credentials { .. } => (
                        AuthFailure::BadCredentials,
                        "platform did not accept the credentials".to_string(),
                    ),
                };
                *state = SessionState::Terminal {
                    reason: reason.clone(),
                };
                Err(Error::auth(kind, reason))
            }
        }
    }

    /// Move a session to the terminal state
    pub async fn invalidate(&self, session: &Session, reason: impl Into<String>) {
        session.invalidate(reason).await;
    }

    /// Same scheme, host and port as the configured platform.
    ///
    /// The session client sends the bearer token on every request, so paging
    /// links pointing anywhere else are never followed.
    fn is_platform_url(&self, url: &str) -> bool {
        url::Url::parse(url).is_ok_and(|url| url.origin() == self.base_url.origin())
    }

    /// Preload the account's owned courses so they are skipped at enrollment.
    ///
    /// Returns the number of courses known afterwards.
    pub async fn load_enrolled_courses(&self, session: &ValidatedSession) -> Result<usize> {
        info!("Loading enrolled courses...");
        let api = session.api();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_ENROLLED_PAGES {
            let page = api.enrolled_courses(cursor.as_deref()).await?;
            let added = session.session().extend_enrolled(page.slugs).await;
            debug!("Enrolled course page added {} slug(s)", added);

            match page.next {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => break,
                Some(next) if !self.is_platform_url(&next) => {
                    warn!("Not following enrolled course page outside the platform: {}", next);
                    break;
                }
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let total = session.session().enrolled_count().await;
        info!("Loaded {} enrolled courses", total);
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::Cookie;
    use crate::session::platform::{ApiResponse, EnrolledPage};
    use crate::session::state::Identity;
    use crate::types::CourseRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct MockPlatform {
        logged_in: bool,
        transient: bool,
        identity_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PlatformApi for MockPlatform {
        async fn current_identity(&self) -> Result<Option<Identity>> {
            self.identity_calls.fetch_add(1, Ordering::SeqCst);
            if self.transient {
                return Err(Error::transport("connection reset"));
            }
            Ok(self.logged_in.then(|| Identity {
                user_id: "7".to_string(),
                display_name: "Ada".to_string(),
                flags: Default::default(),
            }))
        }

        async fn enrolled_courses(&self, cursor: Option<&str>) -> Result<EnrolledPage> {
            Ok(match cursor {
                None => EnrolledPage {
                    slugs: vec!["a".into(), "b".into()],
                    next: Some(
                        "https://www.udemy.com/api-2.0/users/me/subscribed-courses/?page=2".into(),
                    ),
                },
                Some(_) => EnrolledPage {
                    slugs: vec!["b".into(), "c".into()],
                    next: None,
                },
            })
        }

        async fn enroll(&self, _course: &CourseRecord) -> Result<ApiResponse> {
            Ok(ApiResponse::new(200, r#"{"_class":"course"}"#))
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(PlatformSettings::default()).unwrap()
    }

    fn browser_auth() -> SessionAuth {
        SessionAuth::BrowserCookies {
            browser: "firefox".to_string(),
            cookie_count: 2,
        }
    }

    #[tokio::test]
    async fn test_from_credentials_rejects_empty_input() {
        let manager = manager();
        for (id, secret) in [("", "pw"), ("me@example.com", ""), ("   ", "pw")] {
            let err = manager.from_credentials(id, secret).await.unwrap_err();
            assert_eq!(err.auth_failure(), Some(AuthFailure::MalformedInput));
        }
    }

    #[test]
    fn test_from_cookies_rejects_empty_jar() {
        let err = manager().from_cookies(CookieJar::new(), "chrome").unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::NoBrowserSession));
    }

    #[tokio::test]
    async fn test_from_cookies_starts_unvalidated() {
        let jar: CookieJar = vec![Cookie::new(".udemy.com", "access_token", "tok")]
            .into_iter()
            .collect();
        let session = manager().from_cookies(jar, "chrome").unwrap();
        assert_eq!(session.state().await, SessionState::Unvalidated);
        assert_eq!(
            session.auth(),
            &SessionAuth::BrowserCookies {
                browser: "chrome".to_string(),
                cookie_count: 1
            }
        );
    }

    #[tokio::test]
    async fn test_validate_success_is_idempotent() {
        let manager = manager();
        let api = Arc::new(MockPlatform {
            logged_in: true,
            ..Default::default()
        });
        let session = manager.from_api(browser_auth(), api.clone());

        let first = manager.validate(&session).await.unwrap();
        let second = manager.validate(&session).await.unwrap();

        assert_eq!(first.identity().display_name, "Ada");
        assert_eq!(first.identity(), second.identity());
        assert_eq!(api.identity_calls.load(Ordering::SeqCst), 1);
        assert!(first.is_active().await);
    }

    #[tokio::test]
    async fn test_validate_not_logged_in_distinguishes_auth_method() {
        let manager = manager();
        let browser = manager.from_api(browser_auth(), Arc::new(MockPlatform::default()));
        let err = manager.validate(&browser).await.unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::NoBrowserSession));
        assert_eq!(browser.state().await.name(), "terminal");

        let creds = manager.from_api(
            SessionAuth::Credentials {
                identifier: "me@example.com".to_string(),
            },
            Arc::new(MockPlatform::default()),
        );
        let err = manager.validate(&creds).await.unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::BadCredentials));
    }

    #[tokio::test]
    async fn test_transient_failure_leaves_session_retryable() {
        let manager = manager();
        let session = manager.from_api(
            browser_auth(),
            Arc::new(MockPlatform {
                transient: true,
                ..Default::default()
            }),
        );
        let err = manager.validate(&session).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.state().await, SessionState::Unvalidated);
    }

    #[tokio::test]
    async fn test_invalidate_is_terminal() {
        let manager = manager();
        let session = manager.from_api(
            browser_auth(),
            Arc::new(MockPlatform {
                logged_in: true,
                ..Default::default()
            }),
        );
        let validated = manager.validate(&session).await.unwrap();

        manager.invalidate(&session, "401 from enroll").await;

        assert!(!validated.is_active().await);
        let err = manager.validate(&session).await.unwrap_err();
        assert_eq!(err.auth_failure(), Some(AuthFailure::SessionExpired));
    }

    #[tokio::test]
    async fn test_load_enrolled_courses_pages_through() {
        let manager = manager();
        let session = manager.from_api(
            browser_auth(),
            Arc::new(MockPlatform {
                logged_in: true,
                ..Default::default()
            }),
        );
        let validated = manager.validate(&session).await.unwrap();

        let total = manager.load_enrolled_courses(&validated).await.unwrap();
        assert_eq!(total, 3);
        assert!(validated.is_enrolled("c").await);
        assert!(!validated.is_enrolled("d").await);
    }
}
