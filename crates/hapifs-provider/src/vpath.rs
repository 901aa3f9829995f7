//! Virtual path helpers.
//!
//! Virtual paths are `/`-separated and case-sensitive. The tree has three
//! synthetic roots: `/`, `/shares` and `/computers`.

/// The virtual root.
pub const ROOT: &str = "/";
/// Directory listing every share the gatekeeper exposes.
pub const SHARES: &str = "/shares";
/// Directory listing every managed computer.
pub const COMPUTERS: &str = "/computers";

/// Normalize a virtual path: leading `/`, no trailing `/`, no empty segments.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        ROOT.to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Path segments, excluding the empty leading segment.
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Parent of a normalized path. The root has no parent.
pub fn parent(path: &str) -> Option<&str> {
    if path == ROOT {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some(ROOT),
        Some(idx) => Some(&path[..idx]),
        None => None,
    }
}

/// Final segment of a normalized path (empty for the root).
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Join a child name onto a directory path.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// Whether `candidate` is `root` or lies beneath it, comparing whole segments.
///
/// `/a/b` is within `/a`; `/ab` is not.
pub fn is_within(candidate: &str, root: &str) -> bool {
    if root == ROOT {
        return candidate.starts_with('/');
    }
    match candidate.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Whether the path is one of the synthetic roots.
pub fn is_root(path: &str) -> bool {
    matches!(path, ROOT | SHARES | COMPUTERS)
}

/// Depth guard for destructive operations.
///
/// `/shares/Finance` is a share root and may not be modified; anything at
/// least one level below it may.
pub fn below_share_root(path: &str) -> bool {
    segments(path).len() > 2
}

/// Strict ancestors of a normalized path, nearest-root first, excluding `/`.
pub fn ancestors(path: &str) -> Vec<String> {
    let segs = segments(path);
    (1..segs.len())
        .map(|n| format!("/{}", segs[..n].join("/")))
        .collect()
}
