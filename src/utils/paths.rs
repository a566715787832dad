use std::path::Path;

/// Join two POSIX-style path segments. Remote paths are always slash
/// separated regardless of the caller's platform.
pub fn join(base: &str, rest: &str) -> String {
    if rest.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return rest.to_string();
    }
    if rest.starts_with('/') {
        return rest.to_string();
    }
    format!("{}/{}", base.trim_end_matches('/'), rest)
}

pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

pub fn parent(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => "/",
        Some(idx) => &trimmed[..idx],
        None => ".",
    }
}

pub fn is_abs(path: &str) -> bool {
    path.starts_with('/')
}

/// Normalize a native path to forward-slash form for display and globbing.
pub fn to_slash(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if std::path::MAIN_SEPARATOR == '/' {
        raw.into_owned()
    } else {
        raw.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_basic() {
        assert_eq!(join("/a/b", "c"), "/a/b/c");
        assert_eq!(join("/a/b/", "c"), "/a/b/c");
        assert_eq!(join("/a", ""), "/a");
        assert_eq!(join("", "c"), "c");
        assert_eq!(join("/a", "/abs"), "/abs");
    }

    #[test]
    fn base_name_cases() {
        assert_eq!(base_name("/a/b/c.txt"), "c.txt");
        assert_eq!(base_name("/a/b/"), "b");
        assert_eq!(base_name("plain"), "plain");
        assert_eq!(base_name("/"), "/");
    }

    #[test]
    fn parent_cases() {
        assert_eq!(parent("/a/b/c"), "/a/b");
        assert_eq!(parent("/a"), "/");
        assert_eq!(parent("plain"), ".");
        assert_eq!(parent("/a/b/"), "/a");
    }

}
