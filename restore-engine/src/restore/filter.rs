//! Which manifest entries a session restores.

use crate::utils::pathcmp::is_subdir;
use crate::utils::Result;
use regex::bytes::Regex;

#[derive(Debug, Clone, Default)]
pub struct RestoreFilter {
    regex: Option<Regex>,
    paths: Vec<String>,
}

impl RestoreFilter {
    /// Restore everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(regex: Option<&str>, paths: Vec<String>) -> Result<Self> {
        let regex = match regex {
            Some(pattern) if !pattern.is_empty() => Some(Regex::new(pattern)?),
            _ => None,
        };
        Ok(Self { regex, paths })
    }

    /// A path passes when it matches the regex (if any) and equals or lies
    /// beneath one of the selected paths (if any were given).
    pub fn accepts(&self, path: impl AsRef<[u8]>) -> bool {
        let path = path.as_ref();
        let selected = self.paths.is_empty() || self.paths.iter().any(|p| is_subdir(p, path));
        selected && self.regex.as_ref().map_or(true, |re| re.is_match(path))
    }
}
