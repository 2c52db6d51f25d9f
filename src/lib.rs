pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod kv;
pub mod models;
pub mod report;
pub mod service;
pub mod store;

pub use error::{FeedbackError, Result};
pub use service::FeedbackService;
pub use store::FeedbackStore;
