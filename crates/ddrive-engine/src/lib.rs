//! ddrive-engine: the drive controller that the presentation layer drives
//!
//! - `controller`: cached record set, navigation state, upload/delete/
//!   download/folder flows on top of `ddrive-client`
//! - `upload`: upload inputs, per-item outcomes, progress callback type
//! - `stats`: storage usage summary against a quota

pub mod controller;
pub mod stats;
pub mod upload;

pub use controller::{DownloadOutcome, DriveController};
pub use stats::DriveStats;
pub use upload::{BatchReport, ItemOutcome, ProgressFn, UploadInput};
