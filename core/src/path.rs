//! Path algebra for library-relative paths.
//!
//! Paths handled here are always relative to the library root and always use
//! `/` as separator, regardless of the host platform. The empty string denotes
//! the root itself. None of these functions touch the filesystem; mapping a
//! relative path onto disk is the job of [`crate::storage::FileStore`].

/// Separator used in every library-relative path.
pub const SEPARATOR: char = '/';

/// Joins two relative paths, ignoring empty segments.
///
/// `join("a/b", "c.md") == "a/b/c.md"`, `join("", "c.md") == "c.md"`.
pub fn join(base: &str, child: &str) -> String {
    let base = base.trim_end_matches(SEPARATOR);
    let child = child.trim_start_matches(SEPARATOR);
    match (base.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}{SEPARATOR}{child}"),
    }
}

/// Returns everything before the last separator, or `""` for a top-level entry.
pub fn dirname(path: &str) -> &str {
    let path = path.trim_end_matches(SEPARATOR);
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Returns the last segment of the path.
pub fn basename(path: &str) -> &str {
    let path = path.trim_end_matches(SEPARATOR);
    match path.rfind(SEPARATOR) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Returns the basename without its last extension.
///
/// A leading dot does not start an extension: `stem(".env") == ".env"`.
pub fn stem(path: &str) -> &str {
    let name = basename(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Returns the extension of the basename (without the dot), if any.
pub fn extension(path: &str) -> Option<&str> {
    let name = basename(path);
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => Some(&name[idx + 1..]),
        _ => None,
    }
}

/// Splits a path into its non-empty segments.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(SEPARATOR).filter(|s| !s.is_empty())
}

/// Resolves `.` and `..` segments.
///
/// Returns `None` if the path is absolute or climbs above the root.
pub fn normalize(path: &str) -> Option<String> {
    if path.starts_with(SEPARATOR) || path.starts_with('\\') || has_drive_prefix(path) {
        return None;
    }
    let mut out: Vec<&str> = Vec::new();
    for segment in segments(path) {
        match segment {
            "." => {}
            ".." => {
                out.pop()?;
            }
            s => out.push(s),
        }
    }
    Some(out.join("/"))
}

/// Computes the path of `to` relative to the directory `from`.
///
/// Both inputs are expected to be normalized.
pub fn relative(from: &str, to: &str) -> String {
    let from: Vec<&str> = segments(from).collect();
    let to: Vec<&str> = segments(to).collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut parts: Vec<&str> = std::iter::repeat_n("..", from.len() - common).collect();
    parts.extend(&to[common..]);
    parts.join("/")
}

/// Converts a relative path into the platform's native separators so it can be
/// joined onto a root directory.
pub(crate) fn to_native(path: &str) -> std::path::PathBuf {
    segments(path).collect()
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
