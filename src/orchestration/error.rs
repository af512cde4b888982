use crate::orchestration::execution::ExecutionStatus;
use crate::workflow::store::WorkflowStoreError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("unknown workflow `{workflow_id}`")]
    UnknownWorkflow { workflow_id: String },
    #[error("unknown execution `{execution_id}`")]
    UnknownExecution { execution_id: String },
    #[error("execution `{execution_id}` is already terminal ({status})")]
    TerminalExecution {
        execution_id: String,
        status: ExecutionStatus,
    },
    #[error("workflow `{workflow_id}` is disabled")]
    WorkflowDisabled { workflow_id: String },
    #[error("target user `{user_id}` already has an active execution")]
    DuplicateExecution { user_id: String },
    #[error("step `{step_id}` dispatch failed: {reason}")]
    StepDispatch { step_id: String, reason: String },
    #[error("trigger dispatch failed: {0}")]
    TriggerDispatch(String),
    #[error(transparent)]
    Store(#[from] WorkflowStoreError),
}
