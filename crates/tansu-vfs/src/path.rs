//! Virtual path helpers.
//!
//! Virtual paths always use `/` regardless of host platform and are always
//! interpreted relative to the virtual root.

/// Non-empty segments of a path, left to right.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// True if the path names the root.
pub fn is_root(path: &str) -> bool {
    segments(path).next().is_none()
}

/// Parent directory, `"/"` for top-level entries and for the root itself.
pub fn dirname(path: &str) -> String {
    let parts: Vec<&str> = segments(path).collect();
    match parts.split_last() {
        Some((_, parents)) if !parents.is_empty() => format!("/{}", parents.join("/")),
        _ => "/".to_string(),
    }
}

/// Final segment, empty for the root.
pub fn basename(path: &str) -> &str {
    segments(path).last().unwrap_or("")
}

/// Join `child` onto `base`. An absolute `child` replaces `base`.
pub fn join(base: &str, child: &str) -> String {
    if child.starts_with('/') {
        return canonical(child);
    }
    canonical(&format!("{base}/{child}"))
}

/// Absolute form with single separators, no trailing slash, and `.`/`..`
/// applied. `..` never climbs above the root.
pub fn canonical(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in segments(path) {
        match segment {
            "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(segment),
        }
    }
    format!("/{}", parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirname_basename() {
        assert_eq!(dirname("/a/b/c.txt"), "/a/b");
        assert_eq!(dirname("/a"), "/");
        assert_eq!(dirname("/"), "/");
        assert_eq!(basename("/a/b/c.txt"), "c.txt");
        assert_eq!(basename("/a/b/"), "b");
        assert_eq!(basename("/"), "");
    }

    #[test]
    fn test_join_and_canonical() {
        assert_eq!(join("/a", "b"), "/a/b");
        assert_eq!(join("/a/", "/x/y"), "/x/y");
        assert_eq!(canonical("a//b/"), "/a/b");
        assert_eq!(canonical("/a/./b/../c"), "/a/c");
        assert_eq!(canonical("/../../x"), "/x");
        assert_eq!(join("/a/b", "../t"), "/a/t");
        assert_eq!(canonical(""), "/");
        assert!(is_root("//"));
        assert!(!is_root("/a"));
    }
}
