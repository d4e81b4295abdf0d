pub mod analyzer;
pub mod config;
pub mod error;
pub mod model;
pub mod recommend;
pub mod stats;

pub use analyzer::analyze;
pub use analyzer::report::{AnalysisReport, Finding, FindingCategory, Recommendation, Severity};
pub use config::{AnalysisConfig, AnalysisWindow, Thresholds};
pub use error::AnalysisError;
pub use model::Snapshot;
