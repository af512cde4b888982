use crate::intent::score_intent;
use crate::orchestration::tracker::ExecutionTracker;
use crate::workflow::definition::{DelayRange, WorkflowDefinition};
use std::collections::BTreeMap;

/// Behavioral signal distilled from an inbound channel event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BehavioralEvent {
    pub category: String,
    pub user_id: String,
    pub username: Option<String>,
    pub message_preview: String,
}

impl BehavioralEvent {
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.user_id)
    }
}

/// Last-trigger timestamps per user. Process-lifetime only: a restart
/// forgets cooldowns and permits an immediate retrigger.
#[derive(Debug, Default)]
pub struct CooldownTable {
    last_triggered: BTreeMap<String, i64>,
}

impl CooldownTable {
    pub fn is_active(&self, user_id: &str, cooldown_minutes: i64, now: i64) -> bool {
        match self.last_triggered.get(user_id) {
            Some(last) => now.saturating_sub(*last) < cooldown_minutes.saturating_mul(60),
            None => false,
        }
    }

    pub fn stamp(&mut self, user_id: &str, now: i64) {
        self.last_triggered.insert(user_id.to_string(), now);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    CooldownActive,
    DuplicateExecution,
    AlreadyContacted,
    LowIntent { score: u8 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::CooldownActive => write!(f, "cooldown_active"),
            SkipReason::DuplicateExecution => write!(f, "duplicate_execution"),
            SkipReason::AlreadyContacted => write!(f, "already_contacted"),
            SkipReason::LowIntent { score } => write!(f, "low_intent score={score}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    Fire { score: u8 },
    Skip(SkipReason),
}

/// Gate one candidate workflow against one behavioral event. The caller
/// holds the engine lock, so the checks and any subsequent execution
/// creation form a single critical section.
pub fn evaluate_candidate(
    definition: &WorkflowDefinition,
    tracker: &ExecutionTracker,
    cooldowns: &CooldownTable,
    event: &BehavioralEvent,
    now: i64,
) -> TriggerDecision {
    if cooldowns.is_active(&event.user_id, definition.trigger.cooldown_minutes, now) {
        return TriggerDecision::Skip(SkipReason::CooldownActive);
    }
    if tracker.active_for_user(&event.user_id).is_some() {
        return TriggerDecision::Skip(SkipReason::DuplicateExecution);
    }
    if definition.trigger.exclude_contacted && tracker.has_history_for_user(&event.user_id) {
        return TriggerDecision::Skip(SkipReason::AlreadyContacted);
    }
    let score = score_intent(&event.message_preview);
    if score < definition.trigger.min_intent_score {
        return TriggerDecision::Skip(SkipReason::LowIntent { score });
    }
    TriggerDecision::Fire { score }
}

/// Uniform sample in `[min, max]` seconds.
pub fn uniform_delay_seconds(range: &DelayRange) -> Result<u64, String> {
    if range.max <= range.min {
        return Ok(range.min);
    }
    let mut bytes = [0_u8; 8];
    getrandom::getrandom(&mut bytes)
        .map_err(|err| format!("failed to sample contact delay: {err}"))?;
    let span = range.max - range.min + 1;
    Ok(range.min + u64::from_le_bytes(bytes) % span)
}
