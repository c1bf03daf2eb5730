//! Absolute path helpers shared by backends and the shell.

/// Parent of an absolute path; `None` for the root.
pub fn parent_path(path: &str) -> Option<String> {
    if path == "/" || path.is_empty() {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(i) => Some(trimmed[..i].to_string()),
        None => None,
    }
}

/// Last segment of an absolute path; `/` for the root.
pub fn last_segment(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// True when `path` equals `ancestor` or lies beneath it.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor == "/" {
        return path.starts_with('/');
    }
    path == ancestor
        || (path.starts_with(ancestor) && path.as_bytes().get(ancestor.len()) == Some(&b'/'))
}

/// Lexically normalise `segments` against `base` (an absolute path).
///
/// Empty and `.` segments are skipped, `..` pops one level. Returns `None`
/// when `..` would climb above the root.
pub fn normalize<'a>(base: &str, segments: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut stack: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
    for seg in segments {
        match seg {
            "" | "." => {}
            ".." => {
                stack.pop()?;
            }
            name => stack.push(name),
        }
    }
    Some(format!("/{}", stack.join("/")))
}

/// Valid node/property names: non-empty, no `/`, not `.` or `..`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_and_last_segment() {
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("/a").as_deref(), Some("/"));
        assert_eq!(parent_path("/a/b").as_deref(), Some("/a"));
        assert_eq!(last_segment("/"), "/");
        assert_eq!(last_segment("/a/b"), "b");
    }

    #[test]
    fn normalize_handles_dots_and_root_escape() {
        assert_eq!(normalize("/a/b", ["..", "c"]).as_deref(), Some("/a/c"));
        assert_eq!(normalize("/", ["a", "", ".", "b"]).as_deref(), Some("/a/b"));
        assert_eq!(normalize("/a", ["..", ".."]), None);
        assert_eq!(normalize("/a", [".."]).as_deref(), Some("/"));
    }

    #[test]
    fn within_respects_segment_boundaries() {
        assert!(is_within("/a/b", "/a"));
        assert!(is_within("/a", "/a"));
        assert!(!is_within("/ab", "/a"));
        assert!(is_within("/anything", "/"));
    }
}
