//! Replays a fixed set of raw records
//!
//! Used for listings fetched elsewhere (a JSON export, another tool) and as
//! a deterministic source in tests.

use std::path::Path;

use async_trait::async_trait;
use futures::stream;

use super::{RawCourseStream, SourceAdapter};
use crate::{Error, Result, types::RawCourse};

#[derive(Debug, Clone)]
pub struct FixedSource {
    id: String,
    records: Vec<RawCourse>,
    /// When set, `fetch` fails with this message instead
    failure: Option<String>,
}

impl FixedSource {
    pub fn new(id: impl Into<String>, records: Vec<RawCourse>) -> Self {
        Self {
            id: id.into(),
            records,
            failure: None,
        }
    }

    /// A source whose every fetch fails
    pub fn failing(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: Vec::new(),
            failure: Some(message.into()),
        }
    }

    /// Load a JSON array of raw records
    pub fn from_json_file(id: impl Into<String>, path: &Path) -> Result<Self> {
        let id = id.into();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::source(&id, format!("reading {}: {}", path.display(), e)))?;
        let records: Vec<RawCourse> = serde_json::from_str(&content)
            .map_err(|e| Error::source(&id, format!("parsing {}: {}", path.display(), e)))?;
        Ok(Self::new(id, records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SourceAdapter for FixedSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> Result<RawCourseStream> {
        if let Some(message) = &self.failure {
            return Err(Error::source(&self.id, message.clone()));
        }
        let records = self.records.clone();
        Ok(Box::pin(stream::iter(records.into_iter().map(Ok))))
    }
}
