//! Stage sequencing for a prepared plan

use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::language::{RunPlan, StageKind};
use crate::process::ProcessRunner;
use crate::runner::compile::{CompileResult, compile};
use crate::types::{OutcomeStatus, ProcessOutcome};

/// How a plan ended
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// The last stage ran (or a stage timed out or failed to start)
    Finished(ProcessOutcome),

    /// The compiler rejected the program; later stages were skipped
    CompileFailed(CompileResult),
}

/// Run the stages of `plan` in order under one shared deadline
///
/// A compile stage that exits non-zero short-circuits the plan. A stage that
/// times out or cannot be spawned ends the plan with that outcome.
#[instrument(skip_all, fields(stages = plan.stages.len()))]
pub async fn execute(
    processes: &ProcessRunner,
    plan: &RunPlan,
    input: Option<String>,
    deadline: Instant,
) -> PlanOutcome {
    let mut last = None;

    for stage in &plan.stages {
        let outcome = match stage.kind {
            StageKind::Compile => {
                let result = compile(processes, stage, deadline).await;
                if result.is_rejection() {
                    return PlanOutcome::CompileFailed(result);
                }
                result.outcome
            }
            StageKind::Run => {
                let input = if stage.pipes_input { input.clone() } else { None };
                processes.run(stage, input, deadline).await
            }
        };

        if outcome.status != OutcomeStatus::Completed {
            debug!(stage = stage.kind.as_str(), status = ?outcome.status, "stage did not complete");
            return PlanOutcome::Finished(outcome);
        }
        last = Some(outcome);
    }

    // An empty plan never starts anything
    PlanOutcome::Finished(last.unwrap_or_else(|| {
        let mut outcome = ProcessOutcome::out_of_time();
        outcome.status = OutcomeStatus::Completed;
        outcome
    }))
}
