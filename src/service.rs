//! Entry point used by presentation layers.
//!
//! [`FeedbackService`] stamps new submissions with an id and creation time,
//! hands them to [`FeedbackStore`], and recomputes analytics from a fresh
//! read on every call.

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics;
use crate::error::{FeedbackError, Result};
use crate::models::{
    AnalyticsSnapshot, Course, FeedbackInput, FeedbackKind, FeedbackRecord, Teacher,
};
use crate::store::{self, FeedbackStore};

#[derive(Clone)]
pub struct FeedbackService {
    store: FeedbackStore,
}

impl FeedbackService {
    pub fn new(store: FeedbackStore) -> Self {
        Self { store }
    }

    pub async fn submit(&self, input: FeedbackInput) -> Result<FeedbackRecord> {
        let record = stamp(input);
        match self.store.append(record.clone()).await {
            Ok(()) => {
                info!(
                    id = %record.id,
                    kind = %record.kind,
                    target = %record.target_id,
                    rating = record.overall_rating,
                    "feedback submitted"
                );
                Ok(record)
            }
            Err(e) => {
                warn!(error = %e, kind = %record.kind, "feedback rejected");
                Err(e)
            }
        }
    }

    /// Submits every row of a CSV file in one write; returns the row count.
    pub async fn import_csv(&self, csv_path: &Path) -> Result<usize> {
        let inputs = store::read_csv_inputs(csv_path)?;
        let mut records = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let line = index + 2;
            let record = stamp(input);
            record
                .check()
                .map_err(|reason| FeedbackError::Validation(format!("line {line}: {reason}")))?;
            records.push(record);
        }
        let count = records.len();
        self.store.append_all(records).await?;
        info!(count, path = %csv_path.display(), "imported feedback");
        Ok(count)
    }

    pub async fn export_csv(&self, csv_path: &Path) -> Result<usize> {
        self.store.export_csv(csv_path).await
    }

    pub async fn analytics(&self) -> Result<AnalyticsSnapshot> {
        let records = self.store.all().await?;
        analytics::compute_analytics(&records)
    }

    pub async fn all_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        self.store.all().await
    }

    pub async fn feedback_by_kind(&self, kind: FeedbackKind) -> Result<Vec<FeedbackRecord>> {
        let records = self.store.all().await?;
        Ok(records.into_iter().filter(|r| r.kind == kind).collect())
    }

    pub async fn feedback_by_target(&self, target_id: &str) -> Result<Vec<FeedbackRecord>> {
        let records = self.store.all().await?;
        Ok(records
            .into_iter()
            .filter(|r| r.target_id == target_id)
            .collect())
    }

    pub async fn recent_feedback(&self, limit: usize) -> Result<Vec<FeedbackRecord>> {
        let records = self.store.all().await?;
        Ok(analytics::most_recent(&records, limit))
    }

    pub async fn courses(&self) -> Result<Vec<Course>> {
        self.store.courses().await
    }

    pub async fn teachers(&self) -> Result<Vec<Teacher>> {
        self.store.teachers().await
    }
}

fn stamp(input: FeedbackInput) -> FeedbackRecord {
    FeedbackRecord {
        id: Uuid::new_v4().to_string(),
        kind: input.kind,
        target_id: input.target_id,
        target_name: input.target_name,
        overall_rating: input.overall_rating,
        category_ratings: input.category_ratings,
        comment: input.comment,
        created_at: Utc::now(),
    }
}
