//! Directory path helpers for navigating the virtual hierarchy.
//!
//! Directory paths are `""` for the root and `/`-terminated otherwise
//! (`"docs/"`, `"docs/work/"`), so `dir + name` is always a record path.

/// Canonical directory form: no leading `/`, no empty segments, trailing `/`.
pub fn normalize_dir(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        String::new()
    } else {
        format!("{}/", segments.join("/"))
    }
}

/// Directory one level up; the root is its own parent.
pub fn parent_dir(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    if segments.is_empty() {
        String::new()
    } else {
        format!("{}/", segments.join("/"))
    }
}

/// `(name, directory path)` for each ancestor, outermost first.
pub fn breadcrumbs(path: &str) -> Vec<(String, String)> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    (0..segments.len())
        .map(|i| {
            (
                segments[i].to_string(),
                format!("{}/", segments[..=i].join("/")),
            )
        })
        .collect()
}

/// Strip separators and surrounding whitespace from a user-supplied folder
/// name. `None` when nothing usable remains.
pub fn sanitize_folder_name(name: &str) -> Option<String> {
    let clean: String = name.chars().filter(|&c| c != '/').collect();
    let clean = clean.trim();
    if clean.is_empty() {
        None
    } else {
        Some(clean.to_string())
    }
}

/// Final segment of a record path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
