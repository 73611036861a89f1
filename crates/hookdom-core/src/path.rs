//! Identity paths.
//!
//! Every tree position gets a string path derived from its parent and its key
//! or index. Hook state is stored under these paths, so a keyed child keeps its
//! state when it moves among its siblings.

pub const ROOT_PATH: &str = "0";

/// `parent.k<key>` for keyed children, `parent.i<index>` otherwise. An empty
/// key counts as no key.
pub fn create_child_path(parent: &str, key: Option<&str>, index: usize) -> String {
    match key {
        Some(key) if !key.is_empty() => format!("{parent}.k{key}"),
        _ => format!("{parent}.i{index}"),
    }
}

/// Path of the single node rendered by a component.
pub fn component_child_path(parent: &str) -> String {
    format!("{parent}.c0")
}

/// True when `path` is `prefix` itself or lies below it.
pub fn is_within(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Replaces the `from` prefix of `path` with `to`. Paths outside `from` are
/// returned unchanged.
pub fn rebase(path: &str, from: &str, to: &str) -> String {
    if is_within(path, from) {
        format!("{to}{}", &path[from.len()..])
    } else {
        path.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_and_positional_paths() {
        assert_eq!(create_child_path(ROOT_PATH, Some("a"), 3), "0.ka");
        assert_eq!(create_child_path(ROOT_PATH, None, 3), "0.i3");
        assert_eq!(create_child_path("0.i1", Some(""), 0), "0.i1.i0");
        assert_eq!(component_child_path("0.ka"), "0.ka.c0");
    }

    #[test]
    fn prefixes_respect_segment_boundaries() {
        assert!(is_within("0.i1", "0.i1"));
        assert!(is_within("0.i1.c0", "0.i1"));
        assert!(!is_within("0.i10", "0.i1"));
        assert!(!is_within("0", "0.i1"));
    }

    #[test]
    fn rebase_moves_descendants() {
        assert_eq!(rebase("0.i1.c0.i2", "0.i1", "0.i0"), "0.i0.c0.i2");
        assert_eq!(rebase("0.i1", "0.i1", "0.ka"), "0.ka");
        assert_eq!(rebase("0.i10", "0.i1", "0.i0"), "0.i10");
    }
}
