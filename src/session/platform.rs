//! Remote course platform client
//!
//! [`PlatformApi`] is the seam between the session/enrollment logic and the
//! platform's HTTP endpoints; [`PlatformClient`] is the reqwest
//! implementation, tests substitute their own.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{
    Client, StatusCode,
    cookie::{CookieStore, Jar},
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, REFERER, RETRY_AFTER},
};
use url::Url;

use super::state::Identity;
use crate::{Error, Result, config::PlatformSettings, types::CourseRecord};

static COURSE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""id":(\d+)"#).expect("COURSE_ID should compile"));
static COURSE_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/course/([^/?#]+)/").expect("COURSE_SLUG should compile"));

const X_UDEMY_AUTHORIZATION: HeaderName = HeaderName::from_static("x-udemy-authorization");
const X_CSRF_TOKEN: HeaderName = HeaderName::from_static("x-csrftoken");
const X_REQUESTED_WITH: HeaderName = HeaderName::from_static("x-requested-with");

const LOGIN_PATH: &str = "/join/login-popup/?locale=en_US";
const ME_PATH: &str = "/api-2.0/contexts/me/?header=True";
const SUBSCRIBED_PATH: &str = "/api-2.0/users/me/subscribed-courses/";

/// Final HTTP status/body of an enrollment attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
    /// Parsed `Retry-After`, when the platform sent one
    pub retry_after: Option<Duration>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }
}

/// One page of the account's owned courses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrolledPage {
    pub slugs: Vec<String>,
    /// Absolute URL of the next page
    pub next: Option<String>,
}

/// Authenticated platform operations
#[async_trait]
pub trait PlatformApi: Send + Sync + std::fmt::Debug {
    /// Who the session belongs to; `None` when the platform says "not logged in"
    async fn current_identity(&self) -> Result<Option<Identity>>;

    /// One page of owned courses; `cursor` is the previous page's `next`
    async fn enrolled_courses(&self, cursor: Option<&str>) -> Result<EnrolledPage>;

    /// Attempt enrollment with the course's coupon
    async fn enroll(&self, course: &CourseRecord) -> Result<ApiResponse>;
}

/// reqwest-backed platform client
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: Client,
    cookies: Arc<Jar>,
    base_url: Url,
}

impl PlatformClient {
    /// Build a client sharing `cookies`; `bearer` is the `access_token` value
    pub fn new(settings: &PlatformSettings, cookies: Arc<Jar>, bearer: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        if let Some(token) = bearer {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::internal("access token is not a valid header value"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value.clone());
            headers.insert(X_UDEMY_AUTHORIZATION, value);
        }

        let http = Client::builder()
            .cookie_provider(cookies.clone())
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            cookies,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Current value of a cookie the store would send to the platform
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.cookies.cookies(&self.base_url)?;
        let header = header.to_str().ok()?;
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.to_string())
    }

    /// Email/password login through the login form.
    ///
    /// Bootstraps a CSRF token from the login page, posts the form and
    /// requires an `access_token` cookie afterwards.
    pub async fn login(&self, identifier: &str, secret: &str) -> Result<()> {
        let login_url = self.url(LOGIN_PATH)?;

        let page = self.http.get(login_url.clone()).send().await?;
        check_transient(page.status(), &page)?;
        let csrf = self
            .cookie("csrftoken")
            .ok_or_else(|| Error::transport("login page did not set a csrftoken cookie"))?;

        let response = self
            .http
            .post(login_url.clone())
            .header(REFERER, login_url.as_str())
            .header(X_CSRF_TOKEN, csrf.as_str())
            .header(X_REQUESTED_WITH, "XMLHttpRequest")
            .form(&[
                ("csrfmiddlewaretoken", csrf.as_str()),
                ("locale", "en_US"),
                ("email", identifier),
                ("password", secret),
            ])
            .send()
            .await?;

        let status = response.status();
        check_transient(status, &response)?;
        if !status.is_success() {
            return Err(Error::auth(
                crate::AuthFailure::BadCredentials,
                format!("login rejected with status {}", status.as_u16()),
            ));
        }
        if self.cookie("access_token").is_none() {
            return Err(Error::auth(
                crate::AuthFailure::BadCredentials,
                "login did not yield an access token",
            ));
        }
        Ok(())
    }

    async fn get(&self, url: Url) -> Result<ApiResponse> {
        let response = self.http.get(url).send().await?;
        let status = response.status().as_u16();
        let retry_after = retry_after(&response);
        let body = response.text().await?;
        Ok(ApiResponse {
            status,
            body,
            retry_after,
        })
    }

    fn course_page_url(&self, course: &CourseRecord) -> Result<Url> {
        let mut url = self.url(&format!("/course/{}/", course.provider_course_id))?;
        if let Some(code) = &course.coupon_code {
            url.query_pairs_mut().append_pair("couponCode", code);
        }
        Ok(url)
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn current_identity(&self) -> Result<Option<Identity>> {
        let response = self.http.get(self.url(ME_PATH)?).send().await?;
        let status = response.status();
        check_transient(status, &response)?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::transport(format!(
                "identity check returned status {}",
                status.as_u16()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        Ok(parse_identity(&body))
    }

    async fn enrolled_courses(&self, cursor: Option<&str>) -> Result<EnrolledPage> {
        let url = match cursor {
            Some(next) => Url::parse(next)?,
            None => {
                let mut url = self.url(SUBSCRIBED_PATH)?;
                url.query_pairs_mut()
                    .append_pair("ordering", "-enroll_time")
                    .append_pair("fields[course]", "enrollment_time,url")
                    .append_pair("page_size", "100");
                url
            }
        };

        let response = self.get(url).await?;
        match response.status {
            200 => {
                let body: serde_json::Value = serde_json::from_str(&response.body)?;
                Ok(parse_enrolled_page(&body))
            }
            401 | 403 => Err(Error::auth(
                crate::AuthFailure::SessionExpired,
                "enrolled course list refused",
            )),
            429 => Err(Error::RateLimited {
                retry_after: response.retry_after,
            }),
            status => Err(Error::transport(format!(
                "enrolled course list returned status {}",
                status
            ))),
        }
    }

    async fn enroll(&self, course: &CourseRecord) -> Result<ApiResponse> {
        let page = self.get(self.course_page_url(course)?).await?;
        if page.status != 200 {
            return Ok(page);
        }
        let Some(course_id) = COURSE_ID
            .captures(&page.body)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
        else {
            return Ok(ApiResponse::new(200, "course id not found on course page"));
        };

        let mut subscribe = self.url("/course/subscribe/")?;
        subscribe
            .query_pairs_mut()
            .append_pair("courseId", &course_id);
        if let Some(code) = &course.coupon_code {
            subscribe.query_pairs_mut().append_pair("couponCode", code);
        }
        let response = self.get(subscribe).await?;
        if !(200..300).contains(&response.status) {
            return Ok(response);
        }

        let mut verify = self.url(&format!("{}{}/", SUBSCRIBED_PATH, course_id))?;
        verify.query_pairs_mut().append_pair(
            "fields[course]",
            "@default,buyable_object_type,primary_subcategory,is_private",
        );
        self.get(verify).await
    }
}

/// Surface rate limiting and server errors as retryable errors
fn check_transient(status: StatusCode, response: &reqwest::Response) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited {
            retry_after: retry_after(response),
        });
    }
    if status.is_server_error() {
        return Err(Error::transport(format!(
            "platform returned status {}",
            status.as_u16()
        )));
    }
    Ok(())
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

/// `{"header": {"isLoggedIn": true, "user": {"id": .., "display_name": ..}}}`
pub fn parse_identity(body: &serde_json::Value) -> Option<Identity> {
    let header = body.get("header")?;
    if !header.get("isLoggedIn")?.as_bool()? {
        return None;
    }
    let user = header.get("user")?;

    let user_id = match user.get("id")? {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return None,
    };
    let display_name = user
        .get("display_name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unknown")
        .to_string();
    let flags = user
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| v.as_bool() == Some(true))
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default();

    Some(Identity {
        user_id,
        display_name,
        flags,
    })
}

/// Slugs from a `subscribed-courses` page
pub fn parse_enrolled_page(body: &serde_json::Value) -> EnrolledPage {
    let slugs = body
        .get("results")
        .and_then(|r| r.as_array())
        .into_iter()
        .flatten()
        .filter_map(|course| course.get("url")?.as_str())
        .filter_map(|url| COURSE_SLUG.captures(url)?.get(1))
        .map(|m| m.as_str().to_string())
        .collect();
    let next = body
        .get("next")
        .and_then(|n| n.as_str())
        .map(str::to_string);
    EnrolledPage { slugs, next }
}
