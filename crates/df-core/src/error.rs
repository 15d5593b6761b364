use thiserror::Error;

pub type DfResult<T> = Result<T, DfError>;

/// Shared error type for code that sits above the graph crates and only
/// needs to know that an engine invariant was broken.
#[derive(Error, Debug)]
pub enum DfError {
    #[error("Invariant violated: {what}")]
    Invariant { what: String },
}
