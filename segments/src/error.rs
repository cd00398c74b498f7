use thiserror::Error;

/// Conditions that stop the whole pipeline. Problems with individual trips or stops aren't errors;
/// they're reported through `Diagnostics`.
#[derive(Debug, Error, PartialEq)]
pub enum SegmentsError {
    #[error("the feed has no stop times")]
    EmptyFeed,
    #[error("the feed has no trips")]
    NoTrips,
    #[error("no trip references a shape in the feed")]
    MissingShapes,
    #[error("no segments left after filtering ({before_filter} before filtering)")]
    NoSegments { before_filter: usize },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = SegmentsError> = std::result::Result<T, E>;
