//! Pure filtering and sorting of course collections

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::spec::{FilterSpec, SortDirection, SortKey, SortSpec};
use crate::types::CourseRecord;

/// Stateless filter/sort engine
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

/// Overview of a collection, for building a spec interactively
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterStatistics {
    pub total: usize,
    pub languages: BTreeMap<String, usize>,
    pub tags: BTreeMap<String, usize>,
    /// (min, max) over records with a known rating
    pub rating_range: Option<(f64, f64)>,
    /// (min, max) hours over records with a known duration
    pub duration_range: Option<(f64, f64)>,
    pub unrated: usize,
    pub unknown_duration: usize,
}

impl FilterEngine {
    /// Records satisfying every constraint of `spec`, sorted and truncated.
    ///
    /// Input is never modified. Without a sort the input order is kept.
    pub fn apply(records: &[CourseRecord], spec: &FilterSpec) -> Vec<CourseRecord> {
        let keywords = Keywords::from(spec);
        let mut selected: Vec<CourseRecord> = records
            .iter()
            .filter(|record| Self::matches_with(record, spec, &keywords))
            .cloned()
            .collect();

        if let Some(sort) = &spec.sort {
            // Vec::sort_by is stable
            selected.sort_by(|a, b| compare(a, b, sort));
        }
        if let Some(limit) = spec.limit {
            selected.truncate(limit);
        }
        selected
    }

    /// Whether one record passes the predicates of `spec`
    pub fn matches(record: &CourseRecord, spec: &FilterSpec) -> bool {
        Self::matches_with(record, spec, &Keywords::from(spec))
    }

    fn matches_with(record: &CourseRecord, spec: &FilterSpec, keywords: &Keywords) -> bool {
        // An unknown value never satisfies a bound that is set
        if let Some(min) = spec.min_rating {
            if !record.rating.is_some_and(|r| r >= min) {
                return false;
            }
        }
        if let Some(max) = spec.max_duration_hours {
            if !record.duration_hours.is_some_and(|d| d <= max) {
                return false;
            }
        }
        if !keywords.languages.is_empty() {
            let Some(language) = record.language.as_deref().map(str::to_lowercase) else {
                return false;
            };
            if !keywords.languages.iter().any(|l| language.contains(l)) {
                return false;
            }
        }

        if keywords.include.is_empty() && keywords.exclude.is_empty() {
            return true;
        }
        let text = record.searchable_text();
        if keywords.exclude.iter().any(|k| text.contains(k)) {
            return false;
        }
        keywords.include.is_empty() || keywords.include.iter().any(|k| text.contains(k))
    }

    /// Languages, tags and value ranges present in `records`
    pub fn statistics(records: &[CourseRecord]) -> FilterStatistics {
        let mut stats = FilterStatistics {
            total: records.len(),
            ..FilterStatistics::default()
        };

        for record in records {
            if let Some(language) = &record.language {
                *stats.languages.entry(language.clone()).or_default() += 1;
            }
            for tag in &record.tags {
                *stats.tags.entry(tag.clone()).or_default() += 1;
            }
            match record.rating {
                Some(rating) => stats.rating_range = Some(widen(stats.rating_range, rating)),
                None => stats.unrated += 1,
            }
            match record.duration_hours {
                Some(hours) => stats.duration_range = Some(widen(stats.duration_range, hours)),
                None => stats.unknown_duration += 1,
            }
        }
        stats
    }
}

/// Lower-cased keyword sets, computed once per `apply`
struct Keywords {
    languages: Vec<String>,
    include: Vec<String>,
    exclude: Vec<String>,
}

impl From<&FilterSpec> for Keywords {
    fn from(spec: &FilterSpec) -> Self {
        let lower = |words: &[String]| -> Vec<String> {
            words
                .iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect()
        };
        Self {
            languages: lower(&spec.languages),
            include: lower(&spec.include_keywords),
            exclude: lower(&spec.exclude_keywords),
        }
    }
}

/// Active key first; ties go to the more recently discovered record
fn compare(a: &CourseRecord, b: &CourseRecord, sort: &SortSpec) -> Ordering {
    let direction = sort.direction;
    let primary = match sort.key {
        SortKey::Rating => compare_known(a.rating, b.rating, direction),
        SortKey::Duration => compare_known(a.duration_hours, b.duration_hours, direction),
        SortKey::ExpiresAt => compare_known(a.expires_at, b.expires_at, direction),
        SortKey::Title => directed(
            a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            direction,
        ),
        SortKey::DiscoveredAt => directed(a.discovered_at.cmp(&b.discovered_at), direction),
    };
    primary.then_with(|| b.discovered_at.cmp(&a.discovered_at))
}

/// Unknown values sort last in either direction
fn compare_known<T: PartialOrd>(a: Option<T>, b: Option<T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(a.partial_cmp(&b).unwrap_or(Ordering::Equal), direction),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

fn widen(range: Option<(f64, f64)>, value: f64) -> (f64, f64) {
    match range {
        Some((lo, hi)) => (lo.min(value), hi.max(value)),
        None => (value, value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn record(
        slug: &str,
        rating: Option<f64>,
        hours: Option<f64>,
        minutes_ago: i64,
    ) -> CourseRecord {
        let base = Utc.with_ymd_and_hms(2025, 7, 1, 12, 0, 0).unwrap();
        CourseRecord {
            title: slug.replace('-', " "),
            url: format!("https://www.udemy.com/course/{}/", slug),
            provider_course_id: slug.to_string(),
            coupon_code: None,
            source_id: "test".to_string(),
            rating,
            duration_hours: hours,
            language: Some("English".to_string()),
            tags: vec![],
            discovered_at: base - Duration::minutes(minutes_ago),
            expires_at: None,
        }
    }

    fn slugs(records: &[CourseRecord]) -> Vec<&str> {
        records.iter().map(|r| r.provider_course_id.as_str()).collect()
    }

    fn sample() -> Vec<CourseRecord> {
        vec![
            record("rust-basics", Some(4.7), Some(3.0), 5),
            record("python-web", Some(3.9), Some(12.0), 4),
            record("go-intro", None, Some(1.0), 3),
            record("js-testing", Some(4.2), None, 2),
            record("sql-deep", Some(4.7), Some(8.0), 1),
        ]
    }

    #[test]
    fn test_empty_spec_keeps_everything_in_order() {
        let records = sample();
        let result = FilterEngine::apply(&records, &FilterSpec::default());
        assert_eq!(result, records);
    }

    #[test]
    fn test_min_rating_drops_low_and_unknown() {
        let result = FilterEngine::apply(&sample(), &FilterSpec::default().with_min_rating(4.0));
        assert!(result.iter().all(|r| r.rating.is_some_and(|x| x >= 4.0)));
        assert_eq!(slugs(&result), vec!["rust-basics", "js-testing", "sql-deep"]);
    }

    #[test]
    fn test_constraints_are_conjunctive() {
        let spec = FilterSpec::default().with_min_rating(4.0).with_max_duration(5.0);
        assert_eq!(slugs(&FilterEngine::apply(&sample(), &spec)), vec!["rust-basics"]);
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let mut records = sample();
        records[0].tags = vec!["Programming".to_string()];
        let spec = FilterSpec {
            include_keywords: vec!["RUST".to_string(), "web".to_string()],
            exclude_keywords: vec!["basics".to_string()],
            ..FilterSpec::default()
        };
        assert_eq!(slugs(&FilterEngine::apply(&records, &spec)), vec!["python-web"]);
    }

    #[test]
    fn test_keywords_match_tags() {
        let mut records = sample();
        records[2].tags = vec!["Cloud Computing".to_string()];
        let spec = FilterSpec {
            include_keywords: vec!["cloud".to_string()],
            ..FilterSpec::default()
        };
        assert_eq!(slugs(&FilterEngine::apply(&records, &spec)), vec!["go-intro"]);
    }

    #[test]
    fn test_language_is_case_insensitive_substring() {
        let mut records = sample();
        records[1].language = Some("Español".to_string());
        records[3].language = None;
        let spec = FilterSpec {
            languages: vec!["english".to_string()],
            ..FilterSpec::default()
        };
        assert_eq!(
            slugs(&FilterEngine::apply(&records, &spec)),
            vec!["rust-basics", "go-intro", "sql-deep"]
        );
    }

    #[rstest]
    #[case(SortDirection::Descending, vec!["sql-deep", "rust-basics", "js-testing", "python-web", "go-intro"])]
    #[case(SortDirection::Ascending, vec!["python-web", "js-testing", "sql-deep", "rust-basics", "go-intro"])]
    fn test_rating_sort_ties_and_unknowns(
        #[case] direction: SortDirection,
        #[case] expected: Vec<&str>,
    ) {
        let spec = FilterSpec::default().with_sort(SortKey::Rating, direction);
        let result = FilterEngine::apply(&sample(), &spec);
        assert_eq!(slugs(&result), expected);
    }

    #[test]
    fn test_title_sort_and_limit() {
        let spec = FilterSpec::default()
            .with_sort(SortKey::Title, SortDirection::Ascending)
            .with_limit(2);
        assert_eq!(
            slugs(&FilterEngine::apply(&sample(), &spec)),
            vec!["go-intro", "js-testing"]
        );
    }

    #[test]
    fn test_sort_is_idempotent() {
        let spec = FilterSpec::default().with_sort(SortKey::Duration, SortDirection::Ascending);
        let once = FilterEngine::apply(&sample(), &spec);
        let twice = FilterEngine::apply(&once, &spec);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_statistics() {
        let stats = FilterEngine::statistics(&sample());
        assert_eq!(stats.total, 5);
        assert_eq!(stats.languages.get("English"), Some(&5));
        assert_eq!(stats.rating_range, Some((3.9, 4.7)));
        assert_eq!(stats.duration_range, Some((1.0, 12.0)));
        assert_eq!(stats.unrated, 1);
        assert_eq!(stats.unknown_duration, 1);
    }
}
