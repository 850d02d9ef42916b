//! Integration tests for [`FsHost`] against a real temp directory.

use std::fs;

use arbor_host::{FsHost, Host, HostError, TreePath};
use tempfile::TempDir;

fn p(s: &str) -> TreePath {
    TreePath::new(s).unwrap()
}

fn host() -> (TempDir, FsHost) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let host = FsHost::open(dir.path()).expect("open host");
    (dir, host)
}

#[test]
fn open_rejects_files_and_missing_dirs() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("plain.txt");
    fs::write(&file, "x").unwrap();
    assert!(matches!(FsHost::open(&file), Err(HostError::InvalidRoot { .. })));
    assert!(matches!(
        FsHost::open(dir.path().join("nope")),
        Err(HostError::InvalidRoot { .. })
    ));
}

#[test]
fn write_creates_parents_and_read_round_trips() {
    let (dir, host) = host();
    host.write(&p("/src/deep/mod.rs"), b"pub fn f() {}").unwrap();

    assert!(dir.path().join("src/deep/mod.rs").is_file());
    assert_eq!(
        host.read(&p("/src/deep/mod.rs")).unwrap().as_deref(),
        Some(&b"pub fn f() {}"[..])
    );
    assert!(host.exists(&p("/src/deep/mod.rs")).unwrap());
    assert!(!host.exists(&p("/src/deep")).unwrap(), "directories are not files");
    assert_eq!(host.read(&p("/src")).unwrap(), None);
    assert_eq!(host.read(&p("/missing")).unwrap(), None);
}

#[test]
fn list_hides_empty_directories() {
    let (dir, host) = host();
    host.write(&p("/a.txt"), b"a").unwrap();
    host.write(&p("/lib/b.txt"), b"b").unwrap();
    fs::create_dir_all(dir.path().join("empty/nested")).unwrap();

    let listing = host.list(&TreePath::root()).unwrap();
    assert_eq!(listing.files, vec!["a.txt"]);
    assert_eq!(listing.dirs, vec!["lib"]);
}

#[test]
fn delete_prunes_empty_parents() {
    let (dir, host) = host();
    host.write(&p("/x/y/z.txt"), b"z").unwrap();
    host.delete(&p("/x/y/z.txt")).unwrap();

    assert!(!dir.path().join("x").exists());
    assert!(dir.path().exists(), "the root itself is never pruned");
    assert!(matches!(
        host.delete(&p("/x/y/z.txt")),
        Err(HostError::NotFound { .. })
    ));
}

#[test]
fn rename_moves_across_directories() {
    let (dir, host) = host();
    host.write(&p("/old/file.txt"), b"content").unwrap();
    host.rename(&p("/old/file.txt"), &p("/new/place/file.txt")).unwrap();

    assert!(!dir.path().join("old").exists());
    assert_eq!(
        fs::read(dir.path().join("new/place/file.txt")).unwrap(),
        b"content"
    );
    assert!(matches!(
        host.rename(&p("/old/file.txt"), &p("/elsewhere")),
        Err(HostError::NotFound { .. })
    ));
}

#[test]
fn rename_refuses_to_replace_a_file() {
    let (dir, host) = host();
    host.write(&p("/a.txt"), b"a").unwrap();
    host.write(&p("/b.txt"), b"b").unwrap();
    assert!(matches!(
        host.rename(&p("/a.txt"), &p("/b.txt")),
        Err(HostError::AlreadyExists { .. })
    ));
    assert_eq!(fs::read(dir.path().join("a.txt")).unwrap(), b"a");
    assert_eq!(fs::read(dir.path().join("b.txt")).unwrap(), b"b");
}
