//! Error types for import, storage and query handling

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level crate error
#[derive(Debug, Error)]
pub enum Error {
    /// A record failed its format or enumeration constraints
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A client supplied a malformed query parameter
    #[error("{0}")]
    Query(#[from] QueryError),

    /// The town already exists under its district
    #[error("Town {code} already exists in district {district_code} of department {department_code}")]
    DuplicateTown {
        department_code: String,
        district_code: u16,
        code: u16,
    },

    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Constraint violations raised when creating an entity
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is not a valid region code")]
    InvalidRegionCode(String),

    #[error("'{0}' is not a valid department code")]
    InvalidDepartmentCode(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{field} must be a non-negative integer, got '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Malformed filter, ordering or pagination parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid value '{value}' for parameter '{param}'")]
    InvalidParameter { param: &'static str, value: String },

    #[error("Cannot order by unknown field '{0}'")]
    UnknownOrderingField(String),

    #[error("Unknown aggregation level '{0}'. Valid levels: regions, departments, districts, towns")]
    UnknownLevel(String),
}
