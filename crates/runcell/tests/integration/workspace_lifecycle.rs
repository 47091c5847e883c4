use std::collections::HashSet;

use runcell::types::ExecutionRequest;

use super::{leftover_entries, test_runner};

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_concurrent_executions_do_not_share_files() {
    let (runner, root) = test_runner();

    let mut tasks = Vec::new();
    for i in 0..8 {
        let runner = runner.clone();
        tasks.push(tokio::spawn(async move {
            let code = format!(
                "import os, time\nopen('mine.txt', 'w').write('{i}')\ntime.sleep(0.2)\n\
                 print(sorted(os.listdir('.')))\nprint(open('mine.txt').read())"
            );
            (i, runner.execute(ExecutionRequest::new("python", code)).await)
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        let (i, result) = task.await.expect("task panicked");
        let report = result.expect("Execution failed");
        assert_eq!(report.stdout, format!("['mine.txt', 'script.py']\n{i}\n"));
        assert!(ids.insert(report.execution_id));
    }

    assert!(leftover_entries(root.path()).is_empty());
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_workspace_removed_after_failure() {
    let (runner, root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("python", "import sys\nsys.exit(4)"))
        .await
        .expect("Execution failed");

    assert_eq!(report.exit_code, Some(4));
    assert!(leftover_entries(root.path()).is_empty());
}
