//! Hierarchy projection over the flat record set.
//!
//! Folder counts are subtree totals: every record at any depth below a child
//! directory counts toward that child, minus the child's own placeholder.

use ddrive_core::{FileRecord, PLACEHOLDER_NAME};
use serde::Serialize;
use std::collections::HashMap;

/// A directory derived from record paths. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub name: String,
    /// Full directory path, always ending in `/`
    pub path: String,
    /// Records anywhere below this directory, excluding its own placeholder
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ViewItem<'a> {
    Folder(FolderNode),
    File(&'a FileRecord),
}

impl ViewItem<'_> {
    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            ViewItem::Folder(f) => Some(f),
            ViewItem::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileRecord> {
        match self {
            ViewItem::File(r) => Some(r),
            ViewItem::Folder(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedView<'a> {
    /// Folders first (first-seen order), then files (input order)
    pub items: Vec<ViewItem<'a>>,
    pub is_searching: bool,
}

impl<'a> ProjectedView<'a> {
    pub fn folders(&self) -> impl Iterator<Item = &FolderNode> {
        self.items.iter().filter_map(ViewItem::as_folder)
    }

    pub fn files(&self) -> impl Iterator<Item = &FileRecord> {
        self.items.iter().filter_map(ViewItem::as_file)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Project `records` into the view shown at `current_path`.
///
/// `current_path` is `""` for the root, otherwise `/`-terminated. A
/// non-empty `query` switches to a flat, case-insensitive path search that
/// ignores `current_path` and never yields folders. Placeholders are hidden
/// in both modes.
pub fn project<'a>(records: &'a [FileRecord], current_path: &str, query: &str) -> ProjectedView<'a> {
    if !query.is_empty() {
        let needle = query.to_lowercase();
        let items = records
            .iter()
            .filter(|r| !r.is_placeholder() && r.path.to_lowercase().contains(&needle))
            .map(ViewItem::File)
            .collect();
        return ProjectedView {
            items,
            is_searching: true,
        };
    }

    // (path, count) in first-seen order
    let mut folders: Vec<(String, usize)> = Vec::new();
    let mut folder_index: HashMap<String, usize> = HashMap::new();
    let mut files = Vec::new();

    for record in records {
        let Some(remainder) = record.path.strip_prefix(current_path) else {
            continue;
        };

        match remainder.split_once('/') {
            Some((segment, rest)) => {
                let child_path = format!("{current_path}{segment}/");
                let idx = *folder_index.entry(child_path.clone()).or_insert_with(|| {
                    folders.push((child_path, 0));
                    folders.len() - 1
                });
                // The child's own placeholder makes the directory exist but
                // is not one of its items.
                if rest != PLACEHOLDER_NAME {
                    folders[idx].1 += 1;
                }
            }
            None => {
                if remainder != PLACEHOLDER_NAME {
                    files.push(ViewItem::File(record));
                }
            }
        }
    }

    let mut items: Vec<ViewItem<'a>> = folders
        .into_iter()
        .map(|(path, item_count)| {
            let name = path[current_path.len()..path.len() - 1].to_string();
            ViewItem::Folder(FolderNode {
                name,
                path,
                item_count,
            })
        })
        .collect();
    items.extend(files);

    ProjectedView {
        items,
        is_searching: false,
    }
}
