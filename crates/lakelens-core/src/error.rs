use chrono::NaiveDate;
use thiserror::Error;

/// Fatal analysis errors. Anything recoverable (a resource with too few
/// samples, a skipped malformed record) is reported through the report's
/// completeness notes instead.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// The configured date range does not span a single full day.
    #[error("invalid analysis window: {start} to {end} spans zero days")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    /// Too many input records failed shape checks. Conclusions drawn from a
    /// minority of valid data are not trustworthy, so the run aborts instead
    /// of producing a silently truncated report.
    #[error(
        "{skipped} of {total} input records failed shape checks (limit {limit_pct:.0}%); aborting"
    )]
    ExcessiveMalformed {
        skipped: usize,
        total: usize,
        limit_pct: f64,
    },
}
