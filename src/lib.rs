//! Read-only REST API over the French administrative divisions
//! (regions → departments → districts → towns).

pub mod api;
pub mod codes;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod models;

pub use error::{Error, QueryError, Result, ValidationError};
