//! Datapath tokens: the stable name of a file's content inside every
//! generation's `data/` and `deltas.reverse/` trees.

use std::fmt;
use std::path::{Component, Path};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Datapath(String);

impl Datapath {
    /// Validate a token read from a manifest. It must be a relative path
    /// that cannot climb out of the directory it is joined onto.
    pub fn parse(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        let confined = Path::new(token)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        confined.then(|| Datapath(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Datapath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<Path> for Datapath {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_relative_tokens() {
        assert!(Datapath::parse("0000/0001/0042").is_some());
        assert!(Datapath::parse("0000/0001/0042.gz").is_some());
    }

    #[test]
    fn test_rejects_escaping_tokens() {
        assert!(Datapath::parse("").is_none());
        assert!(Datapath::parse("/etc/passwd").is_none());
        assert!(Datapath::parse("0000/../../secret").is_none());
    }
}
