//! Locating a file's content in the generation chain.
//!
//! Full content lives in the newest generation that still has the file;
//! every older generation keeps a reverse delta that turns its newer
//! neighbour's version into its own. Restoring generation `t` therefore
//! means scanning `t, t+1, ...` for the base and replaying the deltas of
//! `base-1` down to `t`.

use crate::storage::{Datapath, GenerationChain};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaStep {
    pub generation: usize,
    pub path: PathBuf,
}

/// Where a file's bytes come from for one target generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub base: usize,
    pub base_path: PathBuf,
    /// In application order
    pub deltas: Vec<DeltaStep>,
    /// Set when the target is a hardlinked archive but the content came
    /// from another generation
    pub found_elsewhere: Option<usize>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("no generation holds the content")]
pub struct NotFound;

pub fn resolve(
    chain: &GenerationChain,
    target: usize,
    datapath: &Datapath,
) -> Result<Resolution, NotFound> {
    if target >= chain.len() {
        return Err(NotFound);
    }

    for base in target..chain.len() {
        let Some(base_path) = chain[base].base_object(datapath) else {
            continue;
        };

        let deltas = (target..base)
            .rev()
            .filter_map(|generation| {
                chain[generation]
                    .delta_object(datapath)
                    .map(|path| DeltaStep { generation, path })
            })
            .collect();

        let found_elsewhere = (base != target && chain[target].hardlinked_archive).then_some(base);

        return Ok(Resolution {
            base,
            base_path,
            deltas,
            found_elsewhere,
        });
    }

    Err(NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::StoreFixture;

    const DP: &str = "0000/0000/0007";

    fn datapath() -> Datapath {
        Datapath::parse(DP).unwrap()
    }

    #[test]
    fn test_base_in_target_needs_no_deltas() {
        let store = StoreFixture::new();
        store.add_generation(1, false);
        store.add_generation(2, false);
        store.put_base(2, DP, b"AAAA");
        store.put_delta(1, DP, b"delta");

        let chain = store.chain();
        let resolution = resolve(&chain, 1, &datapath()).unwrap();

        assert_eq!(resolution.base, 1);
        assert!(resolution.deltas.is_empty());
        assert_eq!(resolution.found_elsewhere, None);
    }

    #[test]
    fn test_deltas_from_base_down_to_target() {
        let store = StoreFixture::new();
        for index in 1..=4 {
            store.add_generation(index, false);
        }
        store.put_base(4, DP, b"newest");
        store.put_delta(3, DP, b"d3");
        // generation 2 did not change the file: no delta stored
        store.put_delta(1, DP, b"d1");

        let chain = store.chain();
        let resolution = resolve(&chain, 0, &datapath()).unwrap();

        assert_eq!(resolution.base, 3);
        let order: Vec<usize> = resolution.deltas.iter().map(|d| d.generation).collect();
        assert_eq!(order, vec![2, 0]);
    }

    #[test]
    fn test_newer_generations_are_not_consulted_for_deltas() {
        let store = StoreFixture::new();
        for index in 1..=3 {
            store.add_generation(index, false);
        }
        store.put_base(2, DP, b"middle");
        store.put_delta(1, DP, b"d1");
        store.put_delta(3, DP, b"unrelated");

        let chain = store.chain();
        let resolution = resolve(&chain, 0, &datapath()).unwrap();

        assert_eq!(resolution.base, 1);
        assert_eq!(resolution.deltas.len(), 1);
        assert_eq!(resolution.deltas[0].generation, 0);
    }

    #[test]
    fn test_not_found() {
        let store = StoreFixture::new();
        store.add_generation(1, false);
        store.add_generation(2, false);
        store.put_delta(1, DP, b"orphaned delta");

        let chain = store.chain();
        assert_eq!(resolve(&chain, 0, &datapath()), Err(NotFound));
        assert_eq!(resolve(&chain, 5, &datapath()), Err(NotFound));
    }

    #[test]
    fn test_older_base_is_ignored() {
        let store = StoreFixture::new();
        store.add_generation(1, false);
        store.add_generation(2, false);
        store.put_base(1, DP, b"only in the old one");

        let chain = store.chain();
        assert_eq!(resolve(&chain, 1, &datapath()), Err(NotFound));
    }

    #[test]
    fn test_hardlinked_target_reports_other_generation() {
        let store = StoreFixture::new();
        store.add_generation(1, true);
        store.add_generation(2, false);
        store.put_base(2, DP, b"shared");

        let chain = store.chain();
        let resolution = resolve(&chain, 0, &datapath()).unwrap();

        assert_eq!(resolution.base, 1);
        assert_eq!(resolution.found_elsewhere, Some(1));
    }
}
