use runcell::types::{ExecutionRequest, RunStatus};

use super::{fixture_source, leftover_entries, test_runner};

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_python_hello() {
    let (runner, root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("python", fixture_source("hello.py")).with_input(""))
        .await
        .expect("Execution failed");

    assert!(report.is_success());
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.exit_code, Some(0));
    assert_eq!(report.stdout, "hi\n");
    assert_eq!(report.stderr, "");
    assert_eq!(report.runtime, "Python 3.11");
    assert!(leftover_entries(root.path()).is_empty());
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_python_split_input() {
    let (runner, _root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("python", fixture_source("sum.py")).with_input("3 4"))
        .await
        .expect("Execution failed");

    assert_eq!(report.stdout, "7\n");
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_python_runtime_error() {
    let (runner, _root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("python", "raise ValueError('boom')"))
        .await
        .expect("Execution failed");

    assert!(report.is_success());
    assert_eq!(report.exit_code, Some(1));
    assert!(report.stderr.contains("ValueError: boom"));
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_python_timeout() {
    let (runner, root) = test_runner();
    let started = std::time::Instant::now();

    let report = runner
        .execute(
            ExecutionRequest::new("python", fixture_source("infinite.py")).with_timeout_ms(200),
        )
        .await
        .expect("Execution failed");

    assert_eq!(report.status, RunStatus::TimedOut);
    assert!(report.exit_code.is_none());
    assert!(started.elapsed() < std::time::Duration::from_secs(2));
    assert!(leftover_entries(root.path()).is_empty());
    assert!(runner.shutdown(std::time::Duration::from_secs(5)).await);
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_javascript_reads_split_input() {
    let (runner, _root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("javascript", fixture_source("hello.js")).with_input("1 2 3"))
        .await
        .expect("Execution failed");

    assert_eq!(report.exit_code, Some(0));
    assert_eq!(report.stdout, "6\n");
    assert_eq!(report.runtime, "Node.js v18.x");
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_typescript_lenient_types() {
    let (runner, _root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("typescript", fixture_source("hello.ts")))
        .await
        .expect("Execution failed");

    assert_eq!(report.exit_code, Some(0), "stderr: {}", report.stderr);
    assert_eq!(report.stdout, "3\n");
}
