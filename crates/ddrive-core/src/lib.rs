//! ddrive-core: types and configuration shared by every ddrive crate

pub mod config;
pub mod error;
pub mod types;

pub use error::{DriveError, DriveResult};
pub use types::{FileId, FileRecord, PLACEHOLDER_NAME};
