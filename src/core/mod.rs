/// Core Module for dbsession
///
/// This module contains the session machinery: error types, the native
/// driver abstraction and the session helpers built on top of it.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{DbError, DriverError, DriverResult, Result};
