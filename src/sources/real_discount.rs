//! Real Discount JSON API
//!
//! One request returns up to `limit` listings under `items`. Links are either
//! direct course URLs or affiliate redirects; redirects are resolved lazily,
//! one record at a time, without ever requesting the course page itself.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    Client,
    header::{ACCEPT, LOCATION, REFERER},
    redirect::Policy,
};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{RawCourseStream, SourceAdapter, http_client};
use crate::{
    Error, Result,
    config::RealDiscountSettings,
    types::{
        RawCourse,
        serde_helpers::{deserialize_flexible_f64, deserialize_flexible_text},
    },
};

const SOURCE_ID: &str = "real.discount";
const PLATFORM_HOST: &str = "udemy.com";
const MAX_REDIRECTS: usize = 5;

/// Response envelope
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    items: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    store: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_f64")]
    rating: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    duration: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    language: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    category: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    subcategory: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    coupon: Option<String>,
    #[serde(default, deserialize_with = "deserialize_flexible_text")]
    sale_end: Option<String>,
}

/// Real Discount adapter
#[derive(Debug, Clone)]
pub struct RealDiscountSource {
    api_url: Url,
    limit: u32,
    client: Client,
    /// Never follows redirects; used to read affiliate `Location` headers
    resolver: Client,
}

impl RealDiscountSource {
    pub fn new(settings: &RealDiscountSettings, timeout: Duration) -> Result<Self> {
        let api_url = Url::parse(&settings.api_url)?;
        let resolver = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;
        Ok(Self {
            api_url,
            limit: settings.limit,
            client: http_client(timeout)?,
            resolver,
        })
    }

    async fn fetch_page(&self) -> Result<Page> {
        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("page", "1")
            .append_pair("limit", &self.limit.to_string())
            .append_pair("sortBy", "sale_start")
            .append_pair("store", "Udemy")
            .append_pair("freeOnly", "true");

        let response = self
            .client
            .get(url)
            .header(REFERER, "https://www.real.discount/")
            .header(ACCEPT, "application/json, text/plain, */*")
            .send()
            .await
            .map_err(|e| Error::source(SOURCE_ID, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::source(
                SOURCE_ID,
                format!("API returned status {}", status.as_u16()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| Error::source(SOURCE_ID, format!("unexpected response: {}", e)))
    }
}

#[async_trait]
impl SourceAdapter for RealDiscountSource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self) -> Result<RawCourseStream> {
        info!("Fetching courses from Real Discount...");
        let page = self.fetch_page().await?;
        info!("Found {} listings on Real Discount", page.items.len());

        let resolver = self.resolver.clone();
        let stream = async_stream::stream! {
            for listing in page.items {
                if listing.store.as_deref() == Some("Sponsored") {
                    continue;
                }
                let title = listing.name.trim().to_string();
                let link = listing.url.trim().to_string();
                if title.is_empty() || link.is_empty() {
                    debug!("Skipping listing without title or link");
                    continue;
                }

                match resolve_platform_url(&resolver, &link).await {
                    Ok(url) => yield Ok(to_raw(title, url, listing)),
                    Err(e) => yield Err(e),
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

fn to_raw(title: String, url: String, listing: Listing) -> RawCourse {
    let mut raw = RawCourse::new(SOURCE_ID, title, url);
    raw.rating = listing.rating;
    raw.duration = listing.duration;
    raw.language = listing.language;
    raw.coupon_code = listing.coupon;
    raw.expires_at = listing
        .sale_end
        .as_deref()
        .and_then(|end| DateTime::parse_from_rfc3339(end).ok())
        .map(|end| end.with_timezone(&Utc));
    raw.tags = [listing.category, listing.subcategory]
        .into_iter()
        .flatten()
        .collect();
    raw
}

/// Follow affiliate redirects by hand until a platform URL shows up
async fn resolve_platform_url(client: &Client, link: &str) -> Result<String> {
    if link.contains(PLATFORM_HOST) {
        return Ok(link.to_string());
    }

    let mut current =
        Url::parse(link).map_err(|e| Error::source(SOURCE_ID, format!("bad link {}: {}", link, e)))?;
    for _ in 0..MAX_REDIRECTS {
        let response = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| Error::source(SOURCE_ID, format!("resolving {}: {}", link, e)))?;

        if !response.status().is_redirection() {
            break;
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            break;
        };
        current = current
            .join(location)
            .map_err(|e| Error::source(SOURCE_ID, format!("bad redirect {}: {}", location, e)))?;
        if current.as_str().contains(PLATFORM_HOST) {
            return Ok(current.into());
        }
    }

    Err(Error::source(
        SOURCE_ID,
        format!("{} does not lead to a course page", link),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source_for(server: &MockServer) -> RealDiscountSource {
        let settings = RealDiscountSettings {
            enabled: true,
            api_url: format!("{}/api/courses", server.uri()),
            limit: 50,
        };
        RealDiscountSource::new(&settings, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_maps_listings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .and(query_param("freeOnly", "true"))
            .and(query_param("limit", "50"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"name": "Ad", "url": "https://www.udemy.com/course/ad/", "store": "Sponsored"},
                    {
                        "name": " Rust Basics ",
                        "url": "https://www.udemy.com/course/rust-basics/?couponCode=FREE",
                        "store": "Udemy",
                        "rating": "4.6",
                        "duration": 3,
                        "language": "English",
                        "category": "Development"
                    },
                    {"name": "", "url": "https://www.udemy.com/course/untitled/"},
                    {"name": "Go", "url": format!("{}/out/go", server.uri())}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out/go"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", "https://www.udemy.com/course/go-lang/?couponCode=GO"),
            )
            .mount(&server)
            .await;

        let source = source_for(&server).await;
        let items: Vec<_> = source.fetch().await.unwrap().collect().await;

        assert_eq!(items.len(), 2);
        let rust = items[0].as_ref().unwrap();
        assert_eq!(rust.title, "Rust Basics");
        assert_eq!(rust.rating, Some(4.6));
        assert_eq!(rust.duration.as_deref(), Some("3"));
        assert_eq!(rust.tags, vec!["Development".to_string()]);
        assert_eq!(rust.source_id, "real.discount");

        let go = items[1].as_ref().unwrap();
        assert_eq!(go.url, "https://www.udemy.com/course/go-lang/?couponCode=GO");
    }

    #[tokio::test]
    async fn test_dead_affiliate_link_is_a_record_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"name": "Gone", "url": format!("{}/out/gone", server.uri())}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/out/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let items: Vec<_> = source_for(&server).await.fetch().await.unwrap().collect().await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(Error::Source { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_api_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source_for(&server).await.fetch().await.err().unwrap();
        assert!(matches!(err, Error::Source { ref source_id, .. } if source_id == "real.discount"));
    }

    #[tokio::test]
    async fn test_garbage_body_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/courses"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        assert!(source_for(&server).await.fetch().await.is_err());
    }
}
