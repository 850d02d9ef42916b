//! Integration tests for the commit sinks against real directories.
//!
//! Coverage:
//! - dry run collects every invalid action and still plans the rest
//! - dry run never touches the host
//! - host sink executes deletes, renames, creates and updates in a safe order
//! - rename swaps and replace-by-rename land correctly on disk
//! - an invalid log aborts before the first write
//! - committing a view commits its base tree's log

mod common;

use std::fs;

use arbor::sink::{DryRunEvent, DryRunSink, HostSink, Sink};
use arbor::{ActionKind, ActionList, Context, HostTree, ScopedTree, Tree, TreeError};
use common::{fs_host, p};

fn read(dir: &tempfile::TempDir, rel: &str) -> Option<String> {
    fs::read_to_string(dir.path().join(rel)).ok()
}

#[test]
fn dry_run_collects_errors_and_plans_the_rest() {
    let (dir, host) = fs_host(&[("README.md", "readme"), ("src/lib.rs", "lib")]);
    let ctx = Context::new();
    let mut log = ActionList::new();
    log.record(
        &ctx,
        ActionKind::Overwrite {
            path: p("/missing.rs"),
            content: b"x".as_slice().into(),
        },
    );
    log.record(
        &ctx,
        ActionKind::Create {
            path: p("/src/main.rs"),
            content: b"fn main() {}".as_slice().into(),
        },
    );
    log.record(
        &ctx,
        ActionKind::Rename {
            path: p("/src/lib.rs"),
            to: p("/README.md"),
        },
    );
    log.record(&ctx, ActionKind::Delete { path: p("/README.md") });

    let report = DryRunSink::new(host).commit_actions(&log).unwrap();
    let events = report.events();
    assert!(matches!(&events[0], DryRunEvent::Error { path, .. } if path == &p("/missing.rs")));
    assert!(matches!(&events[1], DryRunEvent::Error { path, .. } if path == &p("/README.md")));
    assert!(matches!(&events[2], DryRunEvent::Delete { path } if path == &p("/README.md")));
    assert!(matches!(&events[3], DryRunEvent::Create { path, .. } if path == &p("/src/main.rs")));
    assert_eq!(events.len(), 4);
    assert_eq!(report.problems().len(), 2);

    // Nothing was written.
    assert_eq!(read(&dir, "README.md").as_deref(), Some("readme"));
    assert_eq!(read(&dir, "src/main.rs"), None);
}

#[test]
fn host_sink_commits_a_busy_tree() {
    let (dir, host) = fs_host(&[
        ("left.txt", "L"),
        ("right.txt", "R"),
        ("config/old.toml", "old"),
        ("config/app.toml", "app"),
        ("stale.log", "stale"),
    ]);
    let mut tree = HostTree::new(&Context::new(), host.clone());
    tree.rename(&p("/left.txt"), &p("/swap.tmp")).unwrap();
    tree.rename(&p("/right.txt"), &p("/left.txt")).unwrap();
    tree.rename(&p("/swap.tmp"), &p("/right.txt")).unwrap();
    tree.delete(&p("/config/app.toml")).unwrap();
    tree.rename(&p("/config/old.toml"), &p("/config/app.toml")).unwrap();
    tree.overwrite(&p("/config/app.toml"), b"migrated").unwrap();
    tree.delete(&p("/stale.log")).unwrap();
    tree.create(&p("/generated/deep/out.rs"), b"// generated").unwrap();

    let optimized = tree.actions().optimize(tree.context());
    let summary = HostSink::new(host).commit_actions(&optimized).unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.deleted, 2);

    assert_eq!(read(&dir, "left.txt").as_deref(), Some("R"));
    assert_eq!(read(&dir, "right.txt").as_deref(), Some("L"));
    assert_eq!(read(&dir, "config/app.toml").as_deref(), Some("migrated"));
    assert_eq!(read(&dir, "config/old.toml"), None);
    assert_eq!(read(&dir, "stale.log"), None);
    assert_eq!(read(&dir, "generated/deep/out.rs").as_deref(), Some("// generated"));
    assert_eq!(read(&dir, "swap.tmp"), None);
}

#[test]
fn unoptimized_log_commits_the_same_way() {
    let (dir, host) = fs_host(&[("a", "a"), ("b", "b")]);
    let mut tree = HostTree::new(&Context::new(), host.clone());
    tree.create(&p("/c"), b"c1").unwrap();
    tree.overwrite(&p("/c"), b"c2").unwrap();
    tree.rename(&p("/a"), &p("/d")).unwrap();
    tree.delete(&p("/b")).unwrap();
    tree.create(&p("/b"), b"b2").unwrap();

    let summary = HostSink::new(host).commit(&tree).unwrap();
    assert_eq!(summary.to_string(), "1 created, 1 updated, 0 deleted, 1 renamed");
    assert_eq!(read(&dir, "c").as_deref(), Some("c2"));
    assert_eq!(read(&dir, "d").as_deref(), Some("a"));
    assert_eq!(read(&dir, "b").as_deref(), Some("b2"));
    assert_eq!(read(&dir, "a"), None);
}

#[test]
fn invalid_log_writes_nothing() {
    let (dir, host) = fs_host(&[("keep.txt", "keep")]);
    let ctx = Context::new();
    let mut log = ActionList::new();
    log.record(
        &ctx,
        ActionKind::Create {
            path: p("/new.txt"),
            content: b"new".as_slice().into(),
        },
    );
    log.record(
        &ctx,
        ActionKind::Create {
            path: p("/keep.txt"),
            content: b"clobber".as_slice().into(),
        },
    );

    let err = HostSink::new(host.clone()).commit_actions(&log).unwrap_err();
    assert!(matches!(err, TreeError::FileAlreadyExists { ref path } if path == &p("/keep.txt")));
    assert_eq!(read(&dir, "new.txt"), None);
    assert_eq!(read(&dir, "keep.txt").as_deref(), Some("keep"));

    let summary = HostSink::new(host).force(true).commit_actions(&log).unwrap();
    assert_eq!((summary.created, summary.updated), (1, 1));
    assert_eq!(read(&dir, "keep.txt").as_deref(), Some("clobber"));
}

#[test]
fn committing_a_view_commits_the_base_log() {
    let (dir, host) = fs_host(&[("pkg/src/lib.rs", "lib"), ("other.txt", "o")]);
    let mut tree = HostTree::new(&Context::new(), host.clone());
    tree.create(&p("/outside.txt"), b"outside").unwrap();
    let mut scoped = ScopedTree::new(&mut tree, p("/pkg"));
    scoped.create(&p("/src/new.rs"), b"new").unwrap();
    assert_eq!(scoped.actions().len(), 1);

    let summary = HostSink::new(host).commit(&scoped).unwrap();
    assert_eq!(summary.created, 2);
    assert_eq!(read(&dir, "outside.txt").as_deref(), Some("outside"));
    assert_eq!(read(&dir, "pkg/src/new.rs").as_deref(), Some("new"));
}
