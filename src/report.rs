use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::analytics;
use crate::models::{AnalyticsSnapshot, FeedbackKind, FeedbackRecord, MAX_RATING, MIN_RATING};

pub fn build_report(
    generated_at: DateTime<Utc>,
    snapshot: &AnalyticsSnapshot,
    records: &[FeedbackRecord],
    kind_counts: &BTreeMap<FeedbackKind, usize>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Campus Feedback Report");
    let _ = writeln!(output, "Generated {}", generated_at.format("%Y-%m-%d %H:%M UTC"));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Total feedback: {}", snapshot.total_feedback);
    let _ = writeln!(output, "- Average rating: {:.1}", snapshot.average_rating);
    let _ = writeln!(output, "- Courses rated: {}", snapshot.courses_rated);
    let _ = writeln!(output, "- Teachers rated: {}", snapshot.teachers_rated);
    let _ = writeln!(output, "- Satisfaction rate: {}%", snapshot.satisfaction_rate());

    let _ = writeln!(output);
    let _ = writeln!(output, "## Rating Distribution");
    for rating in (MIN_RATING..=MAX_RATING).rev() {
        let _ = writeln!(output, "- {} stars: {}", rating, snapshot.rating_count(rating));
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Feedback by Type");
    for (kind, count) in kind_counts {
        let _ = writeln!(output, "- {}: {}", kind, count);
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Category Averages");

    let chart = analytics::category_chart(snapshot);
    if chart.is_empty() {
        let _ = writeln!(output, "No category ratings recorded.");
    } else {
        for point in chart {
            let _ = writeln!(output, "- {}: {:.1}", point.label, point.average);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Comments");

    let commented: Vec<FeedbackRecord> = records
        .iter()
        .filter(|r| !r.comment.trim().is_empty())
        .cloned()
        .collect();

    if commented.is_empty() {
        let _ = writeln!(output, "No comments submitted yet.");
    } else {
        for record in analytics::most_recent(&commented, 5) {
            let _ = writeln!(
                output,
                "- {} ({}, {} stars) on {}: {}",
                record.target_name,
                record.kind,
                record.overall_rating,
                record.created_at.format("%Y-%m-%d"),
                record.comment.trim()
            );
        }
    }

    output
}
