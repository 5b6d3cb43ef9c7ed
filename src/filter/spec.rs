//! Declarative filter configuration

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Optional constraints plus an optional sort.
///
/// Every field defaults to "no restriction", so `FilterSpec::default()`
/// passes records through untouched and in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSpec {
    /// Inclusive lower bound, 0.0-5.0
    pub min_rating: Option<f64>,
    /// Inclusive upper bound in hours
    pub max_duration_hours: Option<f64>,
    /// Accepted languages; empty accepts any
    pub languages: Vec<String>,
    /// A record must match at least one, when non-empty
    pub include_keywords: Vec<String>,
    /// A record matching any is dropped, even if it also matches an include
    pub exclude_keywords: Vec<String>,
    pub sort: Option<SortSpec>,
    /// Keep at most this many after sorting
    pub limit: Option<usize>,
}

/// Sort key and direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Rating,
    Duration,
    Title,
    DiscoveredAt,
    ExpiresAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl FilterSpec {
    /// Reject bounds no course could meet
    pub fn validate(&self) -> Result<()> {
        if let Some(rating) = self.min_rating.filter(|r| !(0.0..=5.0).contains(r)) {
            return Err(Error::config(format!(
                "min_rating must be within 0.0-5.0, got {}",
                rating
            )));
        }
        if let Some(hours) = self
            .max_duration_hours
            .filter(|h| !(h.is_finite() && *h >= 0.0))
        {
            return Err(Error::config(format!(
                "max_duration_hours must be a non-negative number, got {}",
                hours
            )));
        }
        if self.limit == Some(0) {
            return Err(Error::config("limit must be at least 1"));
        }
        if self
            .include_keywords
            .iter()
            .chain(&self.exclude_keywords)
            .any(|k| k.trim().is_empty())
        {
            return Err(Error::config("filter keywords must not be blank"));
        }
        Ok(())
    }

    pub fn with_min_rating(mut self, rating: f64) -> Self {
        self.min_rating = Some(rating);
        self
    }

    pub fn with_max_duration(mut self, hours: f64) -> Self {
        self.max_duration_hours = Some(hours);
        self
    }

    pub fn with_sort(mut self, key: SortKey, direction: SortDirection) -> Self {
        self.sort = Some(SortSpec { key, direction });
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}
