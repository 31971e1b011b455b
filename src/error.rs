use crate::predicate::Operator;

/// Errors surfaced by the query engine. Absence of a match is never an
/// error; `find_one` and the cache lookups return `Ok(None)` for that.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("unknown field: {0}")]
  UnknownField(String),

  #[error("operator {op:?} is not valid for field {field}")]
  InvalidOperator { op: Operator, field: String },

  #[error("data integrity violation: {0}")]
  DataIntegrity(String),

  #[error("store error: {0}")]
  Store(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("cache format error: {0}")]
  CacheFormat(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
