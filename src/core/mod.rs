/// Core Module for polydb
///
/// This module contains the pieces every front end shares: the error type,
/// backend identification, the record model and the database adapters.

pub mod backend;
pub mod db;
pub mod error;
pub mod record;

// Re-export commonly used types for convenience
pub use backend::{Backend, Target};
pub use error::{PolydbError, Result};
pub use record::Record;
