//! ddrive-view: flat record set → navigable virtual hierarchy
//!
//! The remote store only knows flat `/`-delimited paths. Directories exist
//! purely as a projection computed here; nothing in this crate holds state.
//!
//! - `projector`: (records, current path, search query) → ordered view items
//! - `path`: directory path normalization, navigate-up, breadcrumbs

pub mod path;
pub mod projector;

pub use path::{breadcrumbs, file_name, normalize_dir, parent_dir, sanitize_folder_name};
pub use projector::{project, FolderNode, ProjectedView, ViewItem};
