use crate::channel::{MessageChannel, OutboundCommand};
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::execution::{Execution, StepResult, StepWait};
use crate::workflow::definition::{StepConfig, StepType, WorkflowDefinition};
use serde_json::json;

pub const PLAN_TIMEOUT_SECONDS: i64 = 60;
pub const GROUP_TIMEOUT_SECONDS: i64 = 120;
/// Pause between consecutive step advances of one execution.
pub const RELAXATION_DELAY_SECONDS: i64 = 1;

pub const PLAN_TIMEOUT_ERROR: &str = "planning timed out";
pub const GROUP_TIMEOUT_ERROR: &str = "group creation timed out";

/// A handler either finishes its step inline or parks the execution until a
/// correlated response (or its deadline) arrives.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Done(StepResult),
    Wait(StepWait),
}

pub fn render_group_name(template: &str, user: &str) -> String {
    template.replace("{user}", user)
}

/// Run the handler for one step. Dispatch failures surface as errors and are
/// converted to a terminal failed result by the driver.
pub fn run_step(
    channel: &dyn MessageChannel,
    execution: &Execution,
    workflow: &WorkflowDefinition,
    step: &StepConfig,
    now: i64,
) -> Result<StepOutcome, OrchestratorError> {
    match step.step_type {
        StepType::Evaluate => Ok(StepOutcome::Done(StepResult::success(now))),
        StepType::Plan => {
            channel
                .send(OutboundCommand::RequestAiPlan {
                    goal: workflow.config.marketing_goal.clone(),
                    target_users: vec![execution.target_user_id.clone()],
                    execution_id: execution.id.clone(),
                })
                .map_err(|err| dispatch_error(step, err))?;
            Ok(StepOutcome::Wait(StepWait::PlanResult {
                deadline: now + PLAN_TIMEOUT_SECONDS,
            }))
        }
        StepType::PrivateChat => {
            // Fire-and-forget: conversation progress arrives as separate
            // inbound private-message events.
            channel
                .send(OutboundCommand::StartPrivateChat {
                    target_user_id: execution.target_user_id.clone(),
                    target_user_name: execution.target_user_name.clone(),
                    ai_plan_result: execution.ai_plan_result.clone(),
                    execution_id: execution.id.clone(),
                })
                .map_err(|err| dispatch_error(step, err))?;
            Ok(StepOutcome::Done(StepResult::success(now)))
        }
        StepType::DetectInterest => Ok(StepOutcome::Done(StepResult::success(now))),
        StepType::CreateGroup => {
            let group_name = render_group_name(
                &workflow.config.group_name_template,
                &execution.target_user_name,
            );
            channel
                .send(OutboundCommand::AutoCreateGroup {
                    group_name,
                    target_user_id: execution.target_user_id.clone(),
                    execution_id: execution.id.clone(),
                })
                .map_err(|err| dispatch_error(step, err))?;
            Ok(StepOutcome::Wait(StepWait::GroupCreated {
                deadline: now + GROUP_TIMEOUT_SECONDS,
            }))
        }
        StepType::GroupMarketing => match &execution.group_id {
            None => Ok(StepOutcome::Done(StepResult::skipped(now))),
            Some(group_id) => {
                channel
                    .send(OutboundCommand::StartGroupCollaboration {
                        group_id: group_id.clone(),
                        ai_plan_result: execution.ai_plan_result.clone(),
                        execution_id: execution.id.clone(),
                    })
                    .map_err(|err| dispatch_error(step, err))?;
                Ok(StepOutcome::Done(StepResult::success(now)))
            }
        },
        StepType::Record => Ok(StepOutcome::Done(StepResult::success_with(
            json!({
                "targetUserId": execution.target_user_id,
                "groupId": execution.group_id,
                "outcome": execution.outcome.as_deref().unwrap_or("completed"),
            }),
            now,
        ))),
    }
}

fn dispatch_error(step: &StepConfig, err: crate::channel::ChannelError) -> OrchestratorError {
    OrchestratorError::StepDispatch {
        step_id: step.id.to_string(),
        reason: err.to_string(),
    }
}
