//! Workflow integration: rule → optimize → dry run → commit → tasks.

mod common;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use arbor::config::CONFIG_FILE;
use arbor::error::ExecutorError;
use arbor::task::TaskExecutor;
use arbor::{ArborConfig, Context, MergeStrategy, TaskConfiguration, TaskInfo, Tree, TreeError, Workflow};
use async_trait::async_trait;
use common::{fs_host, p};

/// Records task names and what the committed file looked like when each ran.
struct Observer {
    root: PathBuf,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl TaskExecutor for Observer {
    async fn execute(&self, task: &TaskInfo) -> Result<(), ExecutorError> {
        let manifest = std::fs::read_to_string(self.root.join("package.json"))?;
        let script = task
            .configuration
            .options
            .as_ref()
            .and_then(|options| options.get("script"))
            .and_then(|script| script.as_str())
            .unwrap_or("-");
        self.log
            .lock()
            .unwrap()
            .push(format!("{}:{script}:{}", task.name(), manifest.len()));
        Ok(())
    }
}

fn observer(root: &std::path::Path, log: &Arc<Mutex<Vec<String>>>) -> Observer {
    Observer {
        root: root.to_path_buf(),
        log: Arc::clone(log),
    }
}

#[tokio::test]
async fn tasks_run_after_the_commit_in_dependency_order() {
    let (dir, host) = fs_host(&[("README.md", "# demo")]);
    let config = ArborConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let mut workflow = Workflow::new(&Context::new(), host, config);
    workflow.register("install", observer(dir.path(), &seen));
    workflow.register("run", observer(dir.path(), &seen));

    let outcome = workflow
        .execute(|rc| {
            let mut staging = rc.branch();
            staging.create(&p("/package.json"), br#"{"name":"demo"}"#)?;
            staging.rename(&p("/README.md"), &p("/docs/README.md"))?;
            rc.merge(&staging, MergeStrategy::DEFAULT)?;

            let install = rc.schedule(TaskConfiguration::new("install"))?;
            rc.schedule(
                TaskConfiguration::new("run")
                    .depends_on(install)
                    .with_options(serde_json::json!({ "script": "build" })),
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let summary = outcome.summary.unwrap();
    assert_eq!((summary.created, summary.renamed), (1, 1));
    assert_eq!(outcome.tasks_run, 2);
    assert_eq!(*seen.lock().unwrap(), vec!["install:-:15", "run:build:15"]);
    assert!(dir.path().join("docs/README.md").is_file());
}

#[tokio::test]
async fn configured_dry_run_leaves_the_directory_alone() {
    let (dir, host) = fs_host(&[]);
    std::fs::write(dir.path().join(CONFIG_FILE), "[commit]\ndry_run = true\n").unwrap();
    let config = ArborConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut workflow = Workflow::new(&Context::new(), host, config);
    workflow.register("install", observer(dir.path(), &seen));

    let outcome = workflow
        .execute(|rc| {
            rc.tree.create(&p("/package.json"), b"{}")?;
            rc.schedule(TaskConfiguration::new("install"))?;
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(outcome.summary, None);
    assert_eq!(outcome.tasks_run, 0);
    assert_eq!(outcome.report.events().len(), 1);
    assert!(!dir.path().join("package.json").exists());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn log_that_no_longer_fits_the_host_is_rejected() {
    let (dir, host) = fs_host(&[("a.txt", "a")]);
    let workflow = Workflow::new(&Context::new(), host.clone(), ArborConfig::default());

    let err = workflow
        .execute(|rc| {
            rc.tree.delete(&p("/a.txt"))?;
            rc.tree.create(&p("/b.txt"), b"b")?;
            // The file disappears underneath the staged tree.
            host.delete(&p("/a.txt"))?;
            Ok(())
        })
        .await
        .unwrap_err();
    let problems = match err {
        TreeError::DryRunRejected { problems } => problems,
        other => panic!("expected a rejected dry run, got {other}"),
    };
    assert_eq!(problems.len(), 1);
    assert!(problems[0].starts_with("/a.txt: "), "{problems:?}");
    assert!(!dir.path().join("b.txt").exists());
}

#[tokio::test]
async fn failing_task_is_reported_after_the_commit() {
    let (dir, host) = fs_host(&[]);
    let mut workflow = Workflow::new(&Context::new(), host, ArborConfig::default());
    workflow.register("lint", |_: &TaskInfo| -> Result<(), ExecutorError> { Err("lint failed".into()) });

    let err = workflow
        .execute(|rc| {
            rc.tree.create(&p("/main.rs"), b"fn main() {}")?;
            rc.schedule(TaskConfiguration::new("lint"))?;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, TreeError::TaskFailed { ref name, .. } if name == "lint"));
    assert!(dir.path().join("main.rs").is_file(), "commit happens before tasks");
    assert_eq!(workflow.registry().names().collect::<Vec<_>>(), vec!["lint"]);
}
