use crate::shared::ids::{StepId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (ExecutionStatus::Pending, ExecutionStatus::Running)
                | (ExecutionStatus::Pending, ExecutionStatus::Cancelled)
                | (ExecutionStatus::Running, ExecutionStatus::Completed)
                | (ExecutionStatus::Running, ExecutionStatus::Failed)
                | (ExecutionStatus::Running, ExecutionStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "pending"),
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResultStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub status: StepResultStatus,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: i64,
}

impl StepResult {
    pub fn success(now: i64) -> Self {
        Self {
            status: StepResultStatus::Success,
            data: None,
            error: None,
            timestamp: now,
        }
    }

    pub fn success_with(data: Value, now: i64) -> Self {
        Self {
            status: StepResultStatus::Success,
            data: Some(data),
            error: None,
            timestamp: now,
        }
    }

    pub fn failed(error: impl Into<String>, now: i64) -> Self {
        Self {
            status: StepResultStatus::Failed,
            data: None,
            error: Some(error.into()),
            timestamp: now,
        }
    }

    pub fn skipped(now: i64) -> Self {
        Self {
            status: StepResultStatus::Skipped,
            data: None,
            error: None,
            timestamp: now,
        }
    }
}

/// Where an execution is parked between step completions: an artificial
/// scheduling delay, or a correlated response bounded by a deadline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepWait {
    #[serde(rename_all = "camelCase")]
    Delay { resume_at: i64 },
    #[serde(rename_all = "camelCase")]
    PlanResult { deadline: i64 },
    #[serde(rename_all = "camelCase")]
    GroupCreated { deadline: i64 },
}

/// How many private-conversation lines are retained per execution as
/// AI-analysis context.
pub const RECENT_MESSAGE_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub workflow_id: WorkflowId,
    pub target_user_id: String,
    pub target_user_name: String,
    /// Step about to run or last attempted.
    pub current_step: StepId,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub step_results: BTreeMap<StepId, StepResult>,
    #[serde(default)]
    pub ai_plan_result: Option<Value>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub recent_messages: Vec<String>,
    #[serde(default)]
    pub wait: Option<StepWait>,
    pub started_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub completed_at: Option<i64>,
}

impl Execution {
    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            ExecutionStatus::Pending | ExecutionStatus::Running
        )
    }

    pub fn push_recent_message(&mut self, message: &str) {
        self.recent_messages.push(message.to_string());
        if self.recent_messages.len() > RECENT_MESSAGE_LIMIT {
            let excess = self.recent_messages.len() - RECENT_MESSAGE_LIMIT;
            self.recent_messages.drain(..excess);
        }
    }
}
