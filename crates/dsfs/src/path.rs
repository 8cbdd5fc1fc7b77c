//! Lexical path handling for store keys.
//!
//! Every record key is an absolute, cleaned path: a leading `/`, no empty,
//! `.` or `..` components and no trailing separator. Cleaning never touches
//! the store.

/// The canonical root path.
pub const ROOT: &str = "/";

/// Path component separator.
pub const SEPARATOR: char = '/';

/// Sorts after the separator. Appended to a path, it bounds a range scan
/// that covers the path itself and every path below it, whatever characters
/// their names contain. Siblings sharing the prefix may fall inside the
/// range too (`/dir-x` for `/dir`); filter hits with [`is_descendant`].
pub const MAX_SUFFIX: char = '\x7F';

/// Cleans a path: collapses redundant separators, drops `.`, resolves `..`
/// lexically and roots the result. `""`, `.` and `..` all clean to `/`.
pub fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split(SEPARATOR) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    if parts.is_empty() {
        return ROOT.to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push(SEPARATOR);
        out.push_str(part);
    }
    out
}

/// Returns the directory containing a normalized path. The root is its own
/// parent.
pub fn directory_of(path: &str) -> String {
    match path.rfind(SEPARATOR) {
        Some(0) | None => ROOT.to_string(),
        Some(n) => path[..n].to_string(),
    }
}

/// Returns the last component of a normalized path, or `/` for the root.
pub fn base_name(path: &str) -> &str {
    if is_root(path) {
        return ROOT;
    }
    match path.rfind(SEPARATOR) {
        Some(n) => &path[n + 1..],
        None => path,
    }
}

/// Returns true for the canonical root.
pub fn is_root(path: &str) -> bool {
    path == ROOT
}

/// Returns true if `path` lies strictly below `ancestor`. Both must be
/// normalized.
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    if is_root(ancestor) {
        return !is_root(path) && path.starts_with(SEPARATOR);
    }
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// Upper bound (exclusive) of the parent-path range that covers `path` and
/// everything beneath it.
pub fn range_end(path: &str) -> String {
    let mut end = String::with_capacity(path.len() + 1);
    end.push_str(path);
    end.push(MAX_SUFFIX);
    end
}
