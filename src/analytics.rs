use std::collections::{BTreeMap, HashSet};

use crate::error::{FeedbackError, Result};
use crate::models::{AnalyticsSnapshot, Category, CategoryChartPoint, FeedbackKind, FeedbackRecord};

/// Computes the analytics snapshot for `records`.
///
/// Every output is independent of record order. A record that breaks the
/// persisted-record invariants fails the whole computation.
pub fn compute_analytics(records: &[FeedbackRecord]) -> Result<AnalyticsSnapshot> {
    for record in records {
        record
            .check()
            .map_err(|reason| FeedbackError::InvalidRecord {
                id: record.id.clone(),
                reason,
            })?;
    }

    if records.is_empty() {
        return Ok(AnalyticsSnapshot::default());
    }

    let rating_sum: u64 = records.iter().map(|r| u64::from(r.overall_rating)).sum();

    let mut rating_distribution = BTreeMap::new();
    let mut category_totals: BTreeMap<Category, (u64, u64)> = BTreeMap::new();

    for record in records {
        *rating_distribution.entry(record.overall_rating).or_insert(0) += 1;

        for (category, rating) in &record.category_ratings {
            let entry = category_totals.entry(*category).or_insert((0, 0));
            entry.0 += u64::from(*rating);
            entry.1 += 1;
        }
    }

    let category_averages = category_totals
        .into_iter()
        .map(|(category, (sum, count))| (category, rounded_mean(sum, count)))
        .collect();

    Ok(AnalyticsSnapshot {
        total_feedback: records.len(),
        average_rating: rounded_mean(rating_sum, records.len() as u64),
        courses_rated: distinct_targets(records, FeedbackKind::Course),
        teachers_rated: distinct_targets(records, FeedbackKind::Teacher),
        rating_distribution,
        category_averages,
    })
}

/// Mean of `count` integer ratings summing to `sum`, rounded half-up to one decimal.
///
/// Works in integer tenths so that values such as 4.45 never drift below
/// the rounding boundary.
pub fn rounded_mean(sum: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let tenths = (sum * 20 + count) / (count * 2);
    tenths as f64 / 10.0
}

fn distinct_targets(records: &[FeedbackRecord], kind: FeedbackKind) -> usize {
    records
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| r.target_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Number of records per kind; every kind is present.
pub fn kind_counts(records: &[FeedbackRecord]) -> BTreeMap<FeedbackKind, usize> {
    let mut counts: BTreeMap<FeedbackKind, usize> =
        FeedbackKind::ALL.into_iter().map(|kind| (kind, 0)).collect();
    for record in records {
        *counts.entry(record.kind).or_insert(0) += 1;
    }
    counts
}

/// Chart rows for the category averages already held by `snapshot`.
pub fn category_chart(snapshot: &AnalyticsSnapshot) -> Vec<CategoryChartPoint> {
    snapshot
        .category_averages
        .iter()
        .map(|(category, average)| CategoryChartPoint {
            category: *category,
            label: category.label(),
            average: *average,
        })
        .collect()
}

/// Newest records first, at most `limit` of them.
pub fn most_recent(records: &[FeedbackRecord], limit: usize) -> Vec<FeedbackRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}
