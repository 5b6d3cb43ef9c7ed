//! Discudemy HTML listing pages
//!
//! `/all/<n>` lists cards (`a.card-header`) linking to `/<lang>/<slug>`; the
//! matching `/go/<slug>` page holds the platform link inside
//! `div.ui.segment`. Page 1 is fetched eagerly so an unreachable site fails
//! the whole fetch; later pages and per-course lookups happen lazily.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use super::{RawCourseStream, SourceAdapter, http_client};
use crate::{Error, Result, config::DiscudemySettings, types::RawCourse};

const SOURCE_ID: &str = "discudemy";
const PLATFORM_HOST: &str = "udemy.com";

/// A listing card: title and site-local course id
#[derive(Debug, Clone, PartialEq, Eq)]
struct Card {
    title: String,
    id: String,
}

/// Discudemy adapter
#[derive(Debug, Clone)]
pub struct DiscudemySource {
    base_url: Url,
    pages: u32,
    page_delay: Duration,
    client: Client,
}

impl DiscudemySource {
    pub fn new(settings: &DiscudemySettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: Url::parse(&settings.base_url)?,
            pages: settings.pages.max(1),
            page_delay: Duration::from_millis(settings.page_delay_ms),
            client: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for DiscudemySource {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    async fn fetch(&self) -> Result<RawCourseStream> {
        info!("Fetching courses from Discudemy...");
        let first = listing_page(&self.client, &self.base_url, 1).await?;

        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let pages = self.pages;
        let delay = self.page_delay;

        let stream = async_stream::stream! {
            let mut cards = first;
            let mut page = 1;
            loop {
                debug!("Discudemy page {} has {} card(s)", page, cards.len());
                for card in cards {
                    tokio::time::sleep(delay).await;
                    match course_link(&client, &base_url, &card.id).await {
                        Ok(Some(url)) => yield Ok(RawCourse::new(SOURCE_ID, card.title, url)),
                        Ok(None) => debug!("No platform link for {}", card.id),
                        Err(e) => yield Err(e),
                    }
                }

                page += 1;
                if page > pages {
                    break;
                }
                tokio::time::sleep(delay).await;
                cards = match listing_page(&client, &base_url, page).await {
                    Ok(cards) => cards,
                    Err(e) => {
                        warn!("Stopping at Discudemy page {}: {}", page, e);
                        yield Err(e);
                        break;
                    }
                };
                if cards.is_empty() {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

async fn get_html(client: &Client, url: Url) -> Result<String> {
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| Error::source(SOURCE_ID, format!("request to {} failed: {}", url, e)))?;
    let status = response.status();
    if !status.is_success() {
        return Err(Error::source(
            SOURCE_ID,
            format!("{} returned status {}", url, status.as_u16()),
        ));
    }
    response
        .text()
        .await
        .map_err(|e| Error::source(SOURCE_ID, format!("reading {}: {}", url, e)))
}

async fn listing_page(client: &Client, base_url: &Url, page: u32) -> Result<Vec<Card>> {
    let url = base_url.join(&format!("/all/{}", page))?;
    let html = get_html(client, url).await?;
    Ok(parse_cards(&html))
}

async fn course_link(client: &Client, base_url: &Url, id: &str) -> Result<Option<String>> {
    let url = base_url.join(&format!("/go/{}", id))?;
    let html = get_html(client, url).await?;
    Ok(parse_course_link(&html))
}

/// Cards on a listing page, in page order
fn parse_cards(html: &str) -> Vec<Card> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a.card-header") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|card| {
            let title = card
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            let href = card.value().attr("href")?;
            let id = href.trim_end_matches('/').rsplit('/').next()?.to_string();
            (!title.is_empty() && !id.is_empty()).then_some(Card { title, id })
        })
        .collect()
}

/// First platform link inside `div.ui.segment`
fn parse_course_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.ui.segment a[href]").ok()?;
    document
        .select(&selector)
        .filter_map(|link| link.value().attr("href"))
        .find(|href| href.contains(PLATFORM_HOST))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LISTING: &str = r#"
        <div class="card">
          <a class="card-header" href="https://www.discudemy.com/English/rust-basics">Rust
             Basics</a>
        </div>
        <div class="card">
          <a class="card-header" href="/English/go-web/">Go Web</a>
        </div>
        <a class="card-header">No link</a>
    "#;

    fn go_page(link: &str) -> String {
        format!(
            r#"<div class="ui segment"><p>Get it</p><a href="{}">Take Course</a></div>"#,
            link
        )
    }

    #[test]
    fn test_parse_cards() {
        assert_eq!(
            parse_cards(LISTING),
            vec![
                Card {
                    title: "Rust Basics".to_string(),
                    id: "rust-basics".to_string()
                },
                Card {
                    title: "Go Web".to_string(),
                    id: "go-web".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_course_link_requires_platform_host() {
        assert_eq!(
            parse_course_link(&go_page("https://www.udemy.com/course/x/?couponCode=A")).as_deref(),
            Some("https://www.udemy.com/course/x/?couponCode=A")
        );
        assert_eq!(parse_course_link(&go_page("https://example.com/ad")), None);
        assert_eq!(parse_course_link("<p>nothing</p>"), None);
    }

    #[tokio::test]
    async fn test_fetch_walks_pages_lazily() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/all/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LISTING))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/all/2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/go/rust-basics"))
            .respond_with(ResponseTemplate::new(200).set_body_string(go_page(
                "https://www.udemy.com/course/rust-basics/?couponCode=RB",
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/go/go-web"))
            .respond_with(ResponseTemplate::new(200).set_body_string(go_page("https://ads.example/")))
            .mount(&server)
            .await;

        let settings = DiscudemySettings {
            enabled: true,
            base_url: server.uri(),
            pages: 3,
            page_delay_ms: 0,
        };
        let source = DiscudemySource::new(&settings, Duration::from_secs(5)).unwrap();
        let items: Vec<_> = source.fetch().await.unwrap().collect().await;

        // rust-basics, then the page-2 failure; go-web had no platform link
        assert_eq!(items.len(), 2);
        let raw = items[0].as_ref().unwrap();
        assert_eq!(raw.title, "Rust Basics");
        assert_eq!(raw.url, "https://www.udemy.com/course/rust-basics/?couponCode=RB");
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_unreachable_site_fails_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/all/1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let settings = DiscudemySettings {
            enabled: true,
            base_url: server.uri(),
            pages: 1,
            page_delay_ms: 0,
        };
        let source = DiscudemySource::new(&settings, Duration::from_secs(5)).unwrap();
        assert!(source.fetch().await.is_err());
    }
}
