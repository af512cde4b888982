//! Duplex message channel and notification surface consumed by the
//! orchestrator. The channel transport (websocket bridge, desktop IPC, ...)
//! lives outside this crate; payload shapes below are the contract.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Success => write!(f, "success"),
            NotificationKind::Info => write!(f, "info"),
            NotificationKind::Warning => write!(f, "warning"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

/// Fire-and-forget user-visible feedback.
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, text: &str);
}

/// Notifier that appends to the engine log instead of a UI surface.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    state_root: std::path::PathBuf,
}

impl LogNotifier {
    pub fn new(state_root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, text: &str) {
        crate::shared::logging::append_engine_log(
            &self.state_root,
            &format!("notify kind={kind} text={text}"),
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("message channel rejected command: {0}")]
    Dispatch(String),
}

/// Outbound commands emitted toward the execution service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum OutboundCommand {
    #[serde(rename_all = "camelCase")]
    RequestAiPlan {
        goal: String,
        target_users: Vec<String>,
        execution_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StartPrivateChat {
        target_user_id: String,
        target_user_name: String,
        #[serde(default)]
        ai_plan_result: Option<Value>,
        execution_id: String,
    },
    #[serde(rename_all = "camelCase")]
    AutoCreateGroup {
        group_name: String,
        target_user_id: String,
        execution_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StartGroupCollaboration {
        group_id: String,
        #[serde(default)]
        ai_plan_result: Option<Value>,
        execution_id: String,
    },
    #[serde(rename_all = "camelCase")]
    AnalyzeInterest {
        message: String,
        context: Vec<String>,
        execution_id: String,
    },
}

/// Inbound events the orchestrator consumes. Correlated responses carry the
/// execution id of the outbound command that requested them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum InboundEvent {
    #[serde(rename_all = "camelCase")]
    KeywordMatched {
        user_id: String,
        #[serde(default)]
        username: Option<String>,
        message_preview: String,
    },
    #[serde(rename_all = "camelCase")]
    PrivateMessageReceived {
        user_id: String,
        from_user: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    CollaborationSessionCompleted {
        execution_id: String,
        session_id: String,
        outcome: String,
    },
    #[serde(rename_all = "camelCase")]
    AiPlanResult {
        execution_id: String,
        success: bool,
        #[serde(default)]
        plan: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    GroupCreated {
        execution_id: String,
        success: bool,
        #[serde(default)]
        group_id: Option<String>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    AnalyzeInterestResult {
        execution_id: String,
        success: bool,
        has_interest: bool,
        #[serde(default)]
        signal_type: Option<String>,
        #[serde(default)]
        key_phrase: Option<String>,
        #[serde(default)]
        confidence: Option<f64>,
    },
}

pub trait MessageChannel: Send + Sync {
    fn send(&self, command: OutboundCommand) -> Result<(), ChannelError>;
}

/// In-process channel buffering outbound commands for a bridge worker (or a
/// test harness) to drain.
#[derive(Debug, Default)]
pub struct InMemoryChannel {
    sent: Mutex<Vec<OutboundCommand>>,
}

impl InMemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundCommand> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<OutboundCommand> {
        self.sent
            .lock()
            .map(|mut sent| sent.drain(..).collect())
            .unwrap_or_default()
    }
}

impl MessageChannel for InMemoryChannel {
    fn send(&self, command: OutboundCommand) -> Result<(), ChannelError> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| ChannelError::Dispatch("channel buffer poisoned".to_string()))?;
        sent.push(command);
        Ok(())
    }
}
