//! Raw listing -> canonical [`CourseRecord`]

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::{
    Error, Result,
    types::{CourseRecord, RawCourse, serde_helpers::leading_number},
};

static HOURS_AND_MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*h(?:ours?|rs?)?\s*(\d+)\s*m")
        .expect("HOURS_AND_MINUTES should compile")
});
static HOURS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:hours?|hrs?|h)\b").expect("HOURS should compile")
});
static MINUTES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*(?:minutes?|mins?|m)\b").expect("MINUTES should compile")
});

/// Canonicalize a raw record.
///
/// Fails with a `Source` error when the record has no title or its URL does
/// not point at a course page; the caller collects those and moves on.
pub fn normalize(raw: RawCourse) -> Result<CourseRecord> {
    let title = collapse_whitespace(&raw.title);
    if title.is_empty() {
        return Err(Error::source(&raw.source_id, "listing without a title"));
    }

    let url = Url::parse(raw.url.trim())
        .map_err(|e| Error::source(&raw.source_id, format!("bad url {:?}: {}", raw.url, e)))?;
    let slug = course_slug(&url).ok_or_else(|| {
        Error::source(&raw.source_id, format!("{} is not a course page", url))
    })?;

    let coupon_code = raw
        .coupon_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .or_else(|| coupon_from_url(&url));

    let mut tags: Vec<String> = Vec::new();
    for tag in raw.tags.iter().map(|t| collapse_whitespace(t)) {
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(CourseRecord {
        url: canonical_url(&url, &slug, coupon_code.as_deref()),
        title,
        provider_course_id: slug,
        coupon_code,
        source_id: raw.source_id,
        rating: raw.rating.and_then(clamp_rating),
        duration_hours: raw.duration.as_deref().and_then(parse_duration_hours),
        language: raw
            .language
            .map(|l| collapse_whitespace(&l))
            .filter(|l| !l.is_empty()),
        tags,
        discovered_at: raw.discovered_at,
        expires_at: raw.expires_at,
    })
}

/// Lower-case, collapse whitespace, trim surrounding punctuation
pub fn normalize_title(title: &str) -> String {
    collapse_whitespace(title)
        .to_lowercase()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_string()
}

/// Slug from `/course/<slug>/...`
pub fn course_slug(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    segments.find(|s| *s == "course")?;
    segments
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn coupon_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "couponCode")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Hours from "5.5 hours", "2h 30m", "1 hour 15 min", "90 min" or a bare "5"
pub fn parse_duration_hours(text: &str) -> Option<f64> {
    let number = |caps: &regex::Captures<'_>, i: usize| -> Option<f64> {
        caps.get(i)?.as_str().parse().ok()
    };

    let hours = if let Some(caps) = HOURS_AND_MINUTES.captures(text) {
        number(&caps, 1)? + number(&caps, 2)? / 60.0
    } else if let Some(caps) = HOURS.captures(text) {
        number(&caps, 1)?
    } else if let Some(caps) = MINUTES.captures(text) {
        number(&caps, 1)? / 60.0
    } else {
        leading_number(text)?
    };
    (hours.is_finite() && hours >= 0.0).then_some(hours)
}

fn clamp_rating(rating: f64) -> Option<f64> {
    rating.is_finite().then(|| rating.clamp(0.0, 5.0))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<scheme>://<host>/course/<slug>/[?couponCode=..]`
fn canonical_url(url: &Url, slug: &str, coupon: Option<&str>) -> String {
    let mut canonical = url.clone();
    canonical.set_path(&format!("/course/{}/", slug));
    canonical.set_fragment(None);
    canonical.set_query(None);
    if let Some(code) = coupon {
        canonical.query_pairs_mut().append_pair("couponCode", code);
    }
    canonical.to_string()
}
