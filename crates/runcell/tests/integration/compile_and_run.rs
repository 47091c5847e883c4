use runcell::types::{ExecutionRequest, RunStatus};

use super::{fixture_source, leftover_entries, test_runner};

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_java_public_class_with_input() {
    let (runner, root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("java", fixture_source("Greeter.java")).with_input("World"))
        .await
        .expect("Execution failed");

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.exit_code, Some(0), "stderr: {}", report.stderr);
    assert_eq!(report.stdout, "Hello, World!\n");
    assert_eq!(report.runtime, "Java OpenJDK 11");
    assert!(leftover_entries(root.path()).is_empty());
}

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_java_defaults_to_main() {
    let (runner, _root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("java", fixture_source("default_main.java")))
        .await
        .expect("Execution failed");

    assert_eq!(report.exit_code, Some(0), "stderr: {}", report.stderr);
    assert_eq!(report.stdout, "no public class\n");
}
