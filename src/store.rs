//! Durable feedback log plus the course and teacher catalogs.

use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FeedbackError, Result};
use crate::kv::KvStore;
use crate::models::{
    Category, CategoryRatings, Course, FeedbackInput, FeedbackKind, FeedbackRecord, Teacher,
};

pub const FEEDBACK_KEY: &str = "student_feedback_data";
pub const COURSES_KEY: &str = "courses_data";
pub const TEACHERS_KEY: &str = "teachers_data";

#[derive(Clone)]
pub struct FeedbackStore {
    kv: Arc<dyn KvStore>,
}

impl FeedbackStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn append(&self, record: FeedbackRecord) -> Result<()> {
        self.append_all(vec![record]).await
    }

    /// Validates every record, then persists them in one write.
    ///
    /// Nothing is written if any record fails validation or if the stored
    /// log cannot be parsed.
    pub async fn append_all(&self, records: Vec<FeedbackRecord>) -> Result<()> {
        for record in &records {
            record.check().map_err(FeedbackError::Validation)?;
        }

        let mut existing = self.try_all().await?;
        let added = records.len();
        existing.extend(records);

        let bytes = encode(&existing)?;
        self.kv.write(FEEDBACK_KEY, &bytes).await?;
        debug!(added, total = existing.len(), "appended feedback");
        Ok(())
    }

    /// Every persisted record in storage order; an absent log is empty.
    pub async fn try_all(&self) -> Result<Vec<FeedbackRecord>> {
        match self.kv.read(FEEDBACK_KEY).await? {
            Some(bytes) => decode(FEEDBACK_KEY, &bytes),
            None => Ok(Vec::new()),
        }
    }

    /// Like [`FeedbackStore::try_all`], but a corrupt log reads as empty.
    pub async fn all(&self) -> Result<Vec<FeedbackRecord>> {
        match self.try_all().await {
            Err(e @ FeedbackError::CorruptStore { .. }) => {
                warn!(error = %e, "feedback log unreadable, treating as empty");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    pub async fn courses(&self) -> Result<Vec<Course>> {
        self.catalog(COURSES_KEY, default_courses).await
    }

    pub async fn teachers(&self) -> Result<Vec<Teacher>> {
        self.catalog(TEACHERS_KEY, default_teachers).await
    }

    async fn catalog<T>(&self, key: &str, seed: fn() -> Vec<T>) -> Result<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        match self.kv.read(key).await? {
            Some(bytes) => match decode(key, &bytes) {
                Ok(entries) => Ok(entries),
                Err(e) => {
                    warn!(error = %e, "catalog unreadable, serving seed entries");
                    Ok(seed())
                }
            },
            None => {
                let entries = seed();
                self.kv.write(key, &encode(&entries)?).await?;
                info!(key, count = entries.len(), "seeded catalog");
                Ok(entries)
            }
        }
    }

    /// Writes every record to `path`, returning the number of rows.
    pub async fn export_csv(&self, path: &Path) -> Result<usize> {
        let records = self.try_all().await?;
        let mut writer = csv::Writer::from_path(path)?;
        for record in &records {
            writer.serialize(CsvExportRow {
                id: &record.id,
                kind: record.kind.as_str(),
                target_id: &record.target_id,
                target_name: &record.target_name,
                overall_rating: record.overall_rating,
                comment: &record.comment,
                categories: format_categories(&record.category_ratings),
                created_at: record.created_at.to_rfc3339(),
            })?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| FeedbackError::Storage(e.to_string()))
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| FeedbackError::CorruptStore {
        key: key.to_string(),
        message: e.to_string(),
    })
}

#[derive(Serialize)]
struct CsvExportRow<'a> {
    id: &'a str,
    kind: &'a str,
    target_id: &'a str,
    target_name: &'a str,
    overall_rating: u8,
    comment: &'a str,
    categories: String,
    created_at: String,
}

/// Reads submissions from a CSV file with columns
/// `kind,target_id,target_name,overall_rating,comment,categories`.
pub fn read_csv_inputs(csv_path: &Path) -> Result<Vec<FeedbackInput>> {
    #[derive(Deserialize)]
    struct CsvRow {
        kind: String,
        target_id: String,
        target_name: String,
        overall_rating: u8,
        #[serde(default)]
        comment: String,
        #[serde(default)]
        categories: String,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inputs = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let line = index + 2;
        let row = result?;
        let kind: FeedbackKind = row
            .kind
            .parse()
            .map_err(|e| FeedbackError::Validation(format!("line {line}: {e}")))?;
        let category_ratings = parse_categories(&row.categories)
            .map_err(|e| FeedbackError::Validation(format!("line {line}: {e}")))?;

        inputs.push(FeedbackInput {
            kind,
            target_id: row.target_id,
            target_name: row.target_name,
            overall_rating: row.overall_rating,
            category_ratings,
            comment: row.comment,
        });
    }

    Ok(inputs)
}

/// Parses `content=5;workload=4` into category ratings.
pub fn parse_categories(value: &str) -> Result<CategoryRatings> {
    let mut ratings = CategoryRatings::new();
    for pair in value.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, rating) = pair.split_once('=').ok_or_else(|| {
            FeedbackError::Validation(format!("expected key=value, got '{pair}'"))
        })?;
        let category: Category = name.parse()?;
        let rating: u8 = rating
            .trim()
            .parse()
            .map_err(|_| FeedbackError::Validation(format!("rating '{rating}' is not a number")))?;
        ratings.insert(category, rating);
    }
    Ok(ratings)
}

fn format_categories(ratings: &CategoryRatings) -> String {
    ratings
        .iter()
        .map(|(category, rating)| format!("{category}={rating}"))
        .collect::<Vec<_>>()
        .join(";")
}

pub fn default_courses() -> Vec<Course> {
    [
        ("1", "Introduction to Computer Science", "CS101", "Dr. Smith"),
        ("2", "Data Structures", "CS201", "Prof. Johnson"),
        ("3", "Web Development", "CS301", "Dr. Brown"),
    ]
    .into_iter()
    .map(|(id, name, code, instructor)| Course {
        id: id.to_string(),
        name: name.to_string(),
        code: code.to_string(),
        instructor: instructor.to_string(),
        semester: "Fall 2024".to_string(),
    })
    .collect()
}

pub fn default_teachers() -> Vec<Teacher> {
    [
        ("1", "Dr. Smith", "CS101"),
        ("2", "Prof. Johnson", "CS201"),
        ("3", "Dr. Brown", "CS301"),
    ]
    .into_iter()
    .map(|(id, name, course)| Teacher {
        id: id.to_string(),
        name: name.to_string(),
        department: "Computer Science".to_string(),
        courses: vec![course.to_string()],
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKv;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_record(target_id: &str, rating: u8) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4().to_string(),
            kind: FeedbackKind::Course,
            target_id: target_id.to_string(),
            target_name: "Data Structures".to_string(),
            overall_rating: rating,
            category_ratings: CategoryRatings::new(),
            comment: String::new(),
            created_at: Utc::now(),
        }
    }

    fn store_with(kv: Arc<MemoryKv>) -> FeedbackStore {
        FeedbackStore::new(kv)
    }

    #[tokio::test]
    async fn absent_log_reads_as_empty() {
        let store = store_with(Arc::new(MemoryKv::new()));
        assert!(store.all().await.unwrap().is_empty());
        assert!(store.try_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_keeps_storage_order() {
        let store = store_with(Arc::new(MemoryKv::new()));
        let first = sample_record("CS101", 4);
        let second = sample_record("CS201", 2);
        store.append(first.clone()).await.unwrap();
        store.append(second.clone()).await.unwrap();
        assert_eq!(store.all().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn invalid_record_is_not_persisted() {
        let store = store_with(Arc::new(MemoryKv::new()));
        store.append(sample_record("CS101", 3)).await.unwrap();

        let err = store.append(sample_record("CS101", 6)).await.unwrap_err();
        assert!(matches!(err, FeedbackError::Validation(_)));
        let err = store.append(sample_record("", 3)).await.unwrap_err();
        assert!(matches!(err, FeedbackError::Validation(_)));

        assert_eq!(store.all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_all_is_all_or_nothing() {
        let store = store_with(Arc::new(MemoryKv::new()));
        let batch = vec![sample_record("CS101", 5), sample_record("CS201", 0)];
        assert!(store.append_all(batch).await.is_err());
        assert!(store.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_log_degrades_to_empty_but_blocks_appends() {
        let kv = Arc::new(MemoryKv::new());
        kv.write(FEEDBACK_KEY, b"{not json").await.unwrap();
        let store = store_with(kv.clone());

        assert!(store.all().await.unwrap().is_empty());
        assert!(matches!(
            store.try_all().await,
            Err(FeedbackError::CorruptStore { .. })
        ));
        assert!(matches!(
            store.append(sample_record("CS101", 4)).await,
            Err(FeedbackError::CorruptStore { .. })
        ));
        assert_eq!(
            kv.read(FEEDBACK_KEY).await.unwrap(),
            Some(b"{not json".to_vec())
        );
    }

    #[tokio::test]
    async fn string_ratings_in_storage_are_corrupt() {
        let kv = Arc::new(MemoryKv::new());
        let mut value = serde_json::to_value(vec![sample_record("CS101", 4)]).unwrap();
        value[0]["overall_rating"] = serde_json::json!("4");
        kv.write(FEEDBACK_KEY, &serde_json::to_vec(&value).unwrap())
            .await
            .unwrap();
        let store = store_with(kv);
        assert!(matches!(
            store.try_all().await,
            Err(FeedbackError::CorruptStore { .. })
        ));
    }

    #[tokio::test]
    async fn catalogs_are_seeded_once_and_stable() {
        let kv = Arc::new(MemoryKv::new());
        let store = store_with(kv.clone());

        let first = store.courses().await.unwrap();
        assert!(!first.is_empty());
        assert!(kv.read(COURSES_KEY).await.unwrap().is_some());
        assert_eq!(store.courses().await.unwrap(), first);

        let teachers = store.teachers().await.unwrap();
        assert_eq!(teachers.len(), 3);
        assert_eq!(store.teachers().await.unwrap(), teachers);
    }

    #[tokio::test]
    async fn stored_catalog_is_read_verbatim() {
        let kv = Arc::new(MemoryKv::new());
        let custom = vec![Course {
            id: "42".to_string(),
            name: "Compilers".to_string(),
            code: "CS420".to_string(),
            instructor: "Dr. Lane".to_string(),
            semester: "Spring 2025".to_string(),
        }];
        kv.write(COURSES_KEY, &serde_json::to_vec(&custom).unwrap())
            .await
            .unwrap();
        let store = store_with(kv);
        assert_eq!(store.courses().await.unwrap(), custom);
    }

    #[test]
    fn parses_category_lists() {
        let ratings = parse_categories("content=5; workload = 3").unwrap();
        assert_eq!(ratings.get(&Category::Content), Some(&5));
        assert_eq!(ratings.get(&Category::Workload), Some(&3));
        assert!(parse_categories("").unwrap().is_empty());
        assert!(parse_categories("content").is_err());
        assert!(parse_categories("contnet=5").is_err());
        assert!(parse_categories("content=five").is_err());
    }

    #[tokio::test]
    async fn export_then_import_keeps_submission_fields() {
        let store = store_with(Arc::new(MemoryKv::new()));
        let mut record = sample_record("CS101", 4);
        record.category_ratings.insert(Category::Content, 5);
        record.category_ratings.insert(Category::Workload, 2);
        record.comment = "Clear lectures, heavy labs".to_string();
        store.append(record.clone()).await.unwrap();

        let path = std::env::temp_dir().join(format!("campus-feedback-{}.csv", Uuid::new_v4()));
        assert_eq!(store.export_csv(&path).await.unwrap(), 1);

        let inputs = read_csv_inputs(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].kind, record.kind);
        assert_eq!(inputs[0].target_id, record.target_id);
        assert_eq!(inputs[0].overall_rating, 4);
        assert_eq!(inputs[0].category_ratings, record.category_ratings);
        assert_eq!(inputs[0].comment, record.comment);
    }
}
