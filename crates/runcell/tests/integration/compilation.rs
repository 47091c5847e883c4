use runcell::types::{ExecutionRequest, RunStatus};
use runcell::{ExecuteError, PrepareError};

use super::{fixture_source, leftover_entries, test_runner};

#[tokio::test]
#[ignore = "requires language toolchains"]
async fn test_java_compile_error() {
    let (runner, root) = test_runner();

    let report = runner
        .execute(ExecutionRequest::new("java", fixture_source("compile_error.java")))
        .await
        .expect("Execution failed");

    assert_eq!(report.status, RunStatus::CompilationFailed);
    assert!(report.is_success());
    assert!(report.stdout.is_empty());
    assert!(report.stderr.starts_with("Java Compilation Error:\n"));
    assert!(report.stderr.contains("Broken.java"));
    assert!(matches!(report.exit_code, Some(code) if code != 0));
    assert_eq!(report.runtime, "Java OpenJDK 11 (Compilation Failed)");
    assert!(leftover_entries(root.path()).is_empty());
}

#[tokio::test]
async fn test_java_two_public_classes_rejected_before_compiling() {
    let (runner, root) = test_runner();

    let err = runner
        .execute(ExecutionRequest::new(
            "java",
            "public class A {}\npublic class B {}",
        ))
        .await
        .expect_err("ambiguous source should be rejected");

    assert!(matches!(
        err,
        ExecuteError::Prepare {
            source: PrepareError::AmbiguousClass(_),
            ..
        }
    ));
    assert!(leftover_entries(root.path()).is_empty());
}
