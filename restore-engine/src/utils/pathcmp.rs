//! Path ordering helpers shared by the manifest reader, the directory
//! buffer and the restore filters.

use std::cmp::Ordering;

/// Compare two manifest paths. Plain byte order, except that `/` sorts
/// before every other byte so a directory's children follow it directly.
pub fn pathcmp(a: impl AsRef<[u8]>, b: impl AsRef<[u8]>) -> Ordering {
    let (a, b) = (a.as_ref(), b.as_ref());
    for (&x, &y) in a.iter().zip(b) {
        if x == y {
            continue;
        }
        return match (x, y) {
            (b'/', _) => Ordering::Less,
            (_, b'/') => Ordering::Greater,
            _ => x.cmp(&y),
        };
    }
    a.len().cmp(&b.len())
}

/// True when `path` is `dir` itself or lies somewhere beneath it.
pub fn is_subdir(dir: impl AsRef<[u8]>, path: impl AsRef<[u8]>) -> bool {
    let (dir, path) = (dir.as_ref(), path.as_ref());
    match path.strip_prefix(dir) {
        Some(rest) => rest.is_empty() || rest[0] == b'/' || dir.ends_with(b"/"),
        None => false,
    }
}
