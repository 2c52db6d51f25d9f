use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedbackError;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Course,
    Teacher,
    Facility,
}

impl FeedbackKind {
    pub const ALL: [FeedbackKind; 3] = [
        FeedbackKind::Course,
        FeedbackKind::Teacher,
        FeedbackKind::Facility,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackKind::Course => "course",
            FeedbackKind::Teacher => "teacher",
            FeedbackKind::Facility => "facility",
        }
    }

    /// Categories that may be rated for this kind of target.
    pub fn categories(self) -> &'static [Category] {
        match self {
            FeedbackKind::Course => &[
                Category::Content,
                Category::Difficulty,
                Category::Workload,
                Category::Organization,
            ],
            FeedbackKind::Teacher => &[
                Category::Teaching,
                Category::Communication,
                Category::Availability,
                Category::Fairness,
                Category::Knowledge,
            ],
            FeedbackKind::Facility => &[
                Category::Cleanliness,
                Category::Accessibility,
                Category::Equipment,
                Category::Comfort,
            ],
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| FeedbackError::Validation(format!("unknown feedback kind '{s}'")))
    }
}

/// Rated aspect of a target. Every category belongs to exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    // course
    Content,
    Difficulty,
    Workload,
    Organization,
    // teacher
    Teaching,
    Communication,
    Availability,
    Fairness,
    Knowledge,
    // facility
    Cleanliness,
    Accessibility,
    Equipment,
    Comfort,
}

impl Category {
    pub fn kind(self) -> FeedbackKind {
        match self {
            Category::Content
            | Category::Difficulty
            | Category::Workload
            | Category::Organization => FeedbackKind::Course,
            Category::Teaching
            | Category::Communication
            | Category::Availability
            | Category::Fairness
            | Category::Knowledge => FeedbackKind::Teacher,
            Category::Cleanliness
            | Category::Accessibility
            | Category::Equipment
            | Category::Comfort => FeedbackKind::Facility,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Content => "content",
            Category::Difficulty => "difficulty",
            Category::Workload => "workload",
            Category::Organization => "organization",
            Category::Teaching => "teaching",
            Category::Communication => "communication",
            Category::Availability => "availability",
            Category::Fairness => "fairness",
            Category::Knowledge => "knowledge",
            Category::Cleanliness => "cleanliness",
            Category::Accessibility => "accessibility",
            Category::Equipment => "equipment",
            Category::Comfort => "comfort",
        }
    }

    /// Question shown next to the rating input.
    pub fn description(self) -> &'static str {
        match self {
            Category::Content => "Course Content Quality",
            Category::Difficulty => "Appropriate Difficulty Level",
            Category::Workload => "Reasonable Workload",
            Category::Organization => "Course Organization",
            Category::Teaching => "Teaching Effectiveness",
            Category::Communication => "Communication Skills",
            Category::Availability => "Availability & Support",
            Category::Fairness => "Fair Assessment",
            Category::Knowledge => "Subject Knowledge",
            Category::Cleanliness => "Cleanliness & Maintenance",
            Category::Accessibility => "Accessibility",
            Category::Equipment => "Equipment & Resources",
            Category::Comfort => "Comfort & Environment",
        }
    }

    /// The key with its first letter upper-cased, e.g. `Content`.
    pub fn label(self) -> String {
        let key = self.as_str();
        let mut chars = key.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeedbackKind::ALL
            .iter()
            .flat_map(|kind| kind.categories().iter().copied())
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| FeedbackError::Validation(format!("unknown category '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityType {
    Classroom,
    Laboratory,
    Library,
    Cafeteria,
    Restroom,
    Parking,
    Sports,
    Other,
}

impl FacilityType {
    pub const ALL: [FacilityType; 8] = [
        FacilityType::Classroom,
        FacilityType::Laboratory,
        FacilityType::Library,
        FacilityType::Cafeteria,
        FacilityType::Restroom,
        FacilityType::Parking,
        FacilityType::Sports,
        FacilityType::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FacilityType::Classroom => "classroom",
            FacilityType::Laboratory => "laboratory",
            FacilityType::Library => "library",
            FacilityType::Cafeteria => "cafeteria",
            FacilityType::Restroom => "restroom",
            FacilityType::Parking => "parking",
            FacilityType::Sports => "sports",
            FacilityType::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FacilityType::Classroom => "Classroom",
            FacilityType::Laboratory => "Laboratory",
            FacilityType::Library => "Library",
            FacilityType::Cafeteria => "Cafeteria",
            FacilityType::Restroom => "Restroom",
            FacilityType::Parking => "Parking",
            FacilityType::Sports => "Sports Facility",
            FacilityType::Other => "Other",
        }
    }
}

impl FromStr for FacilityType {
    type Err = FeedbackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FacilityType::ALL
            .into_iter()
            .find(|facility| facility.as_str() == s.trim())
            .ok_or_else(|| FeedbackError::Validation(format!("unknown facility type '{s}'")))
    }
}

/// Stable target id for a facility: `library`, `library-main-hall`, ...
pub fn facility_target_id(facility: FacilityType, location: Option<&str>) -> String {
    let mut id = facility.as_str().to_string();
    let slug = location.map(slugify).unwrap_or_default();
    if !slug.is_empty() {
        id.push('-');
        id.push_str(&slug);
    }
    id
}

fn slugify(value: &str) -> String {
    let mut slug = String::new();
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

pub type CategoryRatings = BTreeMap<Category, u8>;

/// A single persisted feedback submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    pub kind: FeedbackKind,
    pub target_id: String,
    pub target_name: String,
    pub overall_rating: u8,
    #[serde(default)]
    pub category_ratings: CategoryRatings,
    #[serde(default)]
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Checks the persisted-record invariants, returning the first violation.
    pub fn check(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("id is empty".to_string());
        }
        if self.target_id.trim().is_empty() {
            return Err("target id is empty".to_string());
        }
        if !is_valid_rating(self.overall_rating) {
            return Err(format!(
                "overall rating {} outside {MIN_RATING}..={MAX_RATING}",
                self.overall_rating
            ));
        }
        for (category, rating) in &self.category_ratings {
            if category.kind() != self.kind {
                return Err(format!(
                    "category '{category}' does not apply to {} feedback",
                    self.kind
                ));
            }
            if !is_valid_rating(*rating) {
                return Err(format!(
                    "rating {rating} for '{category}' outside {MIN_RATING}..={MAX_RATING}"
                ));
            }
        }
        Ok(())
    }
}

pub fn is_valid_rating(rating: u8) -> bool {
    (MIN_RATING..=MAX_RATING).contains(&rating)
}

/// What a caller submits; identity and timestamp are assigned on submit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackInput {
    pub kind: FeedbackKind,
    pub target_id: String,
    pub target_name: String,
    pub overall_rating: u8,
    #[serde(default)]
    pub category_ratings: CategoryRatings,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub code: String,
    pub instructor: String,
    pub semester: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teacher {
    pub id: String,
    pub name: String,
    pub department: String,
    pub courses: Vec<String>,
}

/// Derived statistics over the full feedback collection.
///
/// `rating_distribution` only holds ratings that were observed; a missing
/// key means zero records, see [`AnalyticsSnapshot::rating_count`].
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub total_feedback: usize,
    pub average_rating: f64,
    pub courses_rated: usize,
    pub teachers_rated: usize,
    pub rating_distribution: BTreeMap<u8, usize>,
    pub category_averages: BTreeMap<Category, f64>,
}

impl AnalyticsSnapshot {
    pub fn rating_count(&self, rating: u8) -> usize {
        self.rating_distribution.get(&rating).copied().unwrap_or(0)
    }

    /// Percentage of records rated 4 or 5, rounded half-up.
    pub fn satisfaction_rate(&self) -> u32 {
        if self.total_feedback == 0 {
            return 0;
        }
        let satisfied: usize = (4..=MAX_RATING).map(|r| self.rating_count(r)).sum();
        ((satisfied * 200 + self.total_feedback) / (self.total_feedback * 2)) as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChartPoint {
    pub category: Category,
    pub label: String,
    pub average: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: FeedbackKind, rating: u8) -> FeedbackRecord {
        FeedbackRecord {
            id: "r1".to_string(),
            kind,
            target_id: "CS101".to_string(),
            target_name: "Introduction to Computer Science".to_string(),
            overall_rating: rating,
            category_ratings: CategoryRatings::new(),
            comment: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn every_category_belongs_to_its_kind_list() {
        for kind in FeedbackKind::ALL {
            for category in kind.categories() {
                assert_eq!(category.kind(), kind);
            }
        }
        let total: usize = FeedbackKind::ALL.iter().map(|k| k.categories().len()).sum();
        assert_eq!(total, 13);
    }

    #[test]
    fn parses_known_names_and_rejects_typos() {
        assert_eq!("workload".parse::<Category>().unwrap(), Category::Workload);
        assert_eq!("teacher".parse::<FeedbackKind>().unwrap(), FeedbackKind::Teacher);
        assert!(matches!(
            "workloda".parse::<Category>(),
            Err(FeedbackError::Validation(_))
        ));
        assert!(matches!(
            "dorm".parse::<FeedbackKind>(),
            Err(FeedbackError::Validation(_))
        ));
    }

    #[test]
    fn check_rejects_out_of_range_ratings() {
        assert!(record(FeedbackKind::Course, 0).check().is_err());
        assert!(record(FeedbackKind::Course, 6).check().is_err());
        assert!(record(FeedbackKind::Course, 1).check().is_ok());
        assert!(record(FeedbackKind::Course, 5).check().is_ok());
    }

    #[test]
    fn check_rejects_foreign_categories() {
        let mut r = record(FeedbackKind::Course, 4);
        r.category_ratings.insert(Category::Fairness, 3);
        let err = r.check().unwrap_err();
        assert!(err.contains("fairness"));
    }

    #[test]
    fn check_rejects_empty_identifiers() {
        let mut r = record(FeedbackKind::Teacher, 4);
        r.target_id = "  ".to_string();
        assert!(r.check().is_err());
        let mut r = record(FeedbackKind::Teacher, 4);
        r.id.clear();
        assert!(r.check().is_err());
    }

    #[test]
    fn facility_ids_are_stable_slugs() {
        assert_eq!(facility_target_id(FacilityType::Library, None), "library");
        assert_eq!(
            facility_target_id(FacilityType::Library, Some("  Main Hall, 2nd floor ")),
            "library-main-hall-2nd-floor"
        );
        assert_eq!(
            facility_target_id(FacilityType::Sports, Some("Gym")),
            facility_target_id(FacilityType::Sports, Some("gym"))
        );
    }

    #[test]
    fn every_category_has_a_distinct_description() {
        let descriptions: std::collections::HashSet<&str> = FeedbackKind::ALL
            .iter()
            .flat_map(|kind| kind.categories().iter().map(|c| c.description()))
            .collect();
        assert_eq!(descriptions.len(), 13);
        assert_eq!(Category::Content.description(), "Course Content Quality");
        assert_eq!(Category::Fairness.description(), "Fair Assessment");
    }

    #[test]
    fn category_labels_are_capitalized_keys() {
        assert_eq!(Category::Content.label(), "Content");
        assert_eq!(Category::Availability.label(), "Availability");
    }

    #[test]
    fn satisfaction_rate_counts_four_and_five() {
        let mut snapshot = AnalyticsSnapshot {
            total_feedback: 3,
            ..Default::default()
        };
        snapshot.rating_distribution.insert(5, 1);
        snapshot.rating_distribution.insert(4, 1);
        snapshot.rating_distribution.insert(2, 1);
        assert_eq!(snapshot.satisfaction_rate(), 67);
        assert_eq!(snapshot.rating_count(3), 0);
        assert_eq!(AnalyticsSnapshot::default().satisfaction_rate(), 0);
    }

    #[test]
    fn record_json_round_trips_every_field() {
        let mut r = record(FeedbackKind::Course, 4);
        r.category_ratings.insert(Category::Content, 5);
        r.comment = "great".to_string();
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"overall_rating\":4"));
        let back: FeedbackRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
