// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// This is intentionally robust:
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - Only if both attempts fail do we give up.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    // Fast path: event path already starts with our root.
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slashed(rel));
    }

    // Event paths from notify are absolute while the root is often ".";
    // canonicalizing both also helps where different absolute prefixes are
    // used for the same directory (symlinks, /private/var on macOS).
    let root_canon = root.canonicalize().ok()?;
    if let Ok(rel) = path.strip_prefix(&root_canon) {
        return Some(slashed(rel));
    }
    // Deleted paths cannot be canonicalized; only their parent can.
    let path_canon = path.canonicalize().ok().or_else(|| {
        let parent = path.parent()?.canonicalize().ok()?;
        Some(parent.join(path.file_name()?))
    })?;
    if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
        return Some(slashed(rel));
    }

    None
}

/// [`relative_str`], falling back to the path as given.
pub fn display_relative(root: &Path, path: &Path) -> String {
    relative_str(root, path).unwrap_or_else(|| slashed(path))
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
