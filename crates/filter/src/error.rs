use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid search operator `{0}`")]
    UnknownOperator(String),

    #[error("Invalid search criteria {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Criteria must be an object keyed by property path, got {0}")]
    NotAnObject(String),
}
