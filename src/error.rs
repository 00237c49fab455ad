//! Input errors.
//!
//! Missing data inside a well-formed table (zero revenue, empty policy,
//! unmatched product) is never an error; it flows through the pipeline as
//! `None`. Only structurally malformed input is rejected here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("cannot read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: `{field}` must be a finite non-negative number, got {value}")]
    InvalidMeasure { line: usize, field: &'static str, value: f64 },

    #[error("line {line}: `{field}` cannot be coerced: {reason}")]
    Coercion { line: usize, field: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, InputError>;
