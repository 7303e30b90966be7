//! User feedback records
//!
//! Feedback is an external curation signal consumed by corpus maintainers;
//! the retrieval path never reads it at query time. Records are appended to
//! a JSONL file under the data directory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{CivicQaError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackKind {
    ThumbsUp,
    ThumbsDown,
    Rating,
    Detailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Accuracy,
    Completeness,
    Clarity,
    Relevance,
    Speed,
}

/// A single piece of user feedback on a query response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub query_text: String,
    pub response_text: String,
    pub kind: FeedbackKind,
    /// 1-5 when `kind` is `Rating`
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub categories: Vec<FeedbackCategory>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub retrieved_chunk_ids: Vec<String>,
    #[serde(default)]
    pub search_method: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(query_text: impl Into<String>, response_text: impl Into<String>, kind: FeedbackKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            query_text: query_text.into(),
            response_text: response_text.into(),
            kind,
            rating: None,
            categories: Vec::new(),
            comment: None,
            retrieved_chunk_ids: Vec::new(),
            search_method: None,
            session_id: None,
            submitted_at: Utc::now(),
        }
    }
}

/// Aggregate view over stored feedback
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackStats {
    pub total: usize,
    pub thumbs_up: usize,
    pub thumbs_down: usize,
    pub average_rating: Option<f64>,
}

/// Append-only JSONL feedback store
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join("feedback.jsonl"),
        }
    }

    /// Append a record, validating the rating range
    pub fn record(&self, record: &FeedbackRecord) -> Result<()> {
        if let Some(rating) = record.rating {
            if !(1..=5).contains(&rating) {
                return Err(CivicQaError::Corpus(format!(
                    "Feedback rating must be between 1 and 5, got {}",
                    rating
                )));
            }
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CivicQaError::Io {
                source: e,
                context: format!("Failed to create feedback directory: {:?}", parent),
            })?;
        }

        let line = serde_json::to_string(record).map_err(|e| CivicQaError::Json {
            source: e,
            context: "Failed to serialize feedback record".to_string(),
        })?;

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| CivicQaError::Io {
                source: e,
                context: format!("Failed to open feedback file: {:?}", self.path),
            })?;
        writeln!(file, "{}", line).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to append feedback record: {:?}", self.path),
        })?;

        tracing::debug!(id = %record.id, "Feedback recorded");
        Ok(())
    }

    /// Load all records, skipping lines that fail to parse
    pub fn load(&self) -> Result<Vec<FeedbackRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| CivicQaError::Io {
            source: e,
            context: format!("Failed to read feedback file: {:?}", self.path),
        })?;

        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Skipping malformed feedback line: {}", e),
            }
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<FeedbackStats> {
        let records = self.load()?;

        let thumbs_up = records
            .iter()
            .filter(|r| r.kind == FeedbackKind::ThumbsUp)
            .count();
        let thumbs_down = records
            .iter()
            .filter(|r| r.kind == FeedbackKind::ThumbsDown)
            .count();

        let ratings: Vec<u8> = records.iter().filter_map(|r| r.rating).collect();
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64)
        };

        Ok(FeedbackStats {
            total: records.len(),
            thumbs_up,
            thumbs_down,
            average_rating,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_load_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FeedbackStore::new(temp.path());

        let mut record = FeedbackRecord::new("query", "answer", FeedbackKind::Rating);
        record.rating = Some(4);
        record.categories = vec![FeedbackCategory::Accuracy];
        store.record(&record).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].rating, Some(4));
        assert_eq!(loaded[0].categories, vec![FeedbackCategory::Accuracy]);
    }

    #[test]
    fn rejects_out_of_range_rating() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FeedbackStore::new(temp.path());

        let mut record = FeedbackRecord::new("query", "answer", FeedbackKind::Rating);
        record.rating = Some(6);
        assert!(store.record(&record).is_err());
    }

    #[test]
    fn stats_aggregate_kinds_and_ratings() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FeedbackStore::new(temp.path());

        store
            .record(&FeedbackRecord::new("q1", "a1", FeedbackKind::ThumbsUp))
            .unwrap();
        store
            .record(&FeedbackRecord::new("q2", "a2", FeedbackKind::ThumbsDown))
            .unwrap();
        let mut rated = FeedbackRecord::new("q3", "a3", FeedbackKind::Rating);
        rated.rating = Some(5);
        store.record(&rated).unwrap();
        let mut rated = FeedbackRecord::new("q4", "a4", FeedbackKind::Rating);
        rated.rating = Some(3);
        store.record(&rated).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.thumbs_up, 1);
        assert_eq!(stats.thumbs_down, 1);
        assert_eq!(stats.average_rating, Some(4.0));
    }

    #[test]
    fn empty_store_has_empty_stats() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FeedbackStore::new(temp.path());

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.average_rating, None);
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = FeedbackStore::new(temp.path());

        store
            .record(&FeedbackRecord::new("q", "a", FeedbackKind::ThumbsUp))
            .unwrap();
        std::fs::write(
            temp.path().join("feedback.jsonl"),
            format!(
                "{}\nnot json at all\n",
                serde_json::to_string(&FeedbackRecord::new("q", "a", FeedbackKind::ThumbsUp))
                    .unwrap()
            ),
        )
        .unwrap();

        assert_eq!(store.load().unwrap().len(), 1);
    }
}
