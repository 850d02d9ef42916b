//! Shared test helpers for arbor integration tests.
//!
//! Every test builds its own [`Context`] so ids are reproducible, and its
//! own host (in memory, or a temp directory for [`FsHost`]).

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use arbor::{Context, FsHost, Host, HostTree, MemoryHost, TreePath};
use tempfile::TempDir;

/// Parse a path literal.
pub fn p(s: &str) -> TreePath {
    TreePath::new(s).unwrap()
}

/// An in-memory host seeded with `files`, plus a shared handle to it.
pub fn memory_host(files: &[(&str, &str)]) -> Arc<MemoryHost> {
    Arc::new(MemoryHost::with_files(files.iter().copied()).expect("seed memory host"))
}

/// A tree over a fresh in-memory host seeded with `files`.
pub fn tree_over(files: &[(&str, &str)]) -> (Arc<MemoryHost>, HostTree) {
    let host = memory_host(files);
    let tree = HostTree::new(&Context::new(), host.clone());
    (host, tree)
}

/// A temp directory seeded with `files` and an [`FsHost`] rooted there.
pub fn fs_host(files: &[(&str, &str)]) -> (TempDir, Arc<dyn Host>) {
    let dir = TempDir::new().expect("failed to create temp dir");
    for (path, content) in files {
        let target = dir.path().join(path.trim_start_matches('/'));
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(target, content).unwrap();
    }
    let host = FsHost::open(dir.path()).expect("open host");
    (dir, Arc::new(host))
}

/// Host contents as UTF-8 strings keyed by path string.
pub fn contents(host: &MemoryHost) -> BTreeMap<String, String> {
    host.snapshot()
        .into_iter()
        .map(|(path, bytes)| (path.to_string(), String::from_utf8(bytes).unwrap()))
        .collect()
}

/// Build an expected [`contents`] map.
pub fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(path, content)| ((*path).to_owned(), (*content).to_owned()))
        .collect()
}
