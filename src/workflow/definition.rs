use crate::interest::InterestCategory;
use crate::shared::ids::{StepId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// The only trigger category produced by the keyword monitor today.
pub const KEYWORD_MATCH_TRIGGER: &str = "keyword_match";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Evaluate,
    Plan,
    PrivateChat,
    DetectInterest,
    CreateGroup,
    GroupMarketing,
    Record,
}

impl StepType {
    pub fn as_str(self) -> &'static str {
        match self {
            StepType::Evaluate => "evaluate",
            StepType::Plan => "plan",
            StepType::PrivateChat => "private_chat",
            StepType::DetectInterest => "detect_interest",
            StepType::CreateGroup => "create_group",
            StepType::GroupMarketing => "group_marketing",
            StepType::Record => "record",
        }
    }
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    pub id: StepId,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub name: String,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub next_on_success: Option<StepId>,
    #[serde(default)]
    pub next_on_fail: Option<StepId>,
}

fn default_min_intent_score() -> u8 {
    60
}

fn default_cooldown_minutes() -> i64 {
    1440
}

fn default_exclude_blacklist() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: String,
    #[serde(default = "default_min_intent_score")]
    pub min_intent_score: u8,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub exclude_contacted: bool,
    #[serde(default = "default_exclude_blacklist")]
    pub exclude_blacklist: bool,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_type: KEYWORD_MATCH_TRIGGER.to_string(),
            min_intent_score: default_min_intent_score(),
            cooldown_minutes: default_cooldown_minutes(),
            exclude_contacted: false,
            exclude_blacklist: default_exclude_blacklist(),
        }
    }
}

/// Inclusive bounds in seconds for a randomized scheduling delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

fn default_marketing_goal() -> String {
    "introduce the premium service and convert interested users".to_string()
}

fn default_first_contact_delay() -> DelayRange {
    DelayRange { min: 30, max: 180 }
}

fn default_interest_signals() -> Vec<InterestCategory> {
    vec![
        InterestCategory::PurchaseIntent,
        InterestCategory::PriceInquiry,
    ]
}

fn default_group_name_template() -> String {
    "VIP service group - {user}".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignConfig {
    #[serde(default = "default_marketing_goal")]
    pub marketing_goal: String,
    #[serde(default)]
    pub role_strategy: Option<String>,
    #[serde(default = "default_first_contact_delay")]
    pub first_contact_delay: DelayRange,
    /// Signal categories allowed to fast-forward a live execution.
    #[serde(default = "default_interest_signals")]
    pub interest_signals: Vec<InterestCategory>,
    #[serde(default = "default_group_name_template")]
    pub group_name_template: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            marketing_goal: default_marketing_goal(),
            role_strategy: None,
            first_contact_delay: default_first_contact_delay(),
            interest_signals: default_interest_signals(),
            group_name_template: default_group_name_template(),
            extra: Map::new(),
        }
    }
}

/// Persisted counters. `activeExecutions` is intentionally absent: it is a
/// live count derived from the execution tracker, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    #[serde(default)]
    pub total_triggers: u64,
    #[serde(default)]
    pub today_triggers: u64,
    #[serde(default)]
    pub conversions: u64,
    #[serde(default)]
    pub last_triggered_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    pub enabled: bool,
    pub trigger: TriggerConfig,
    pub steps: Vec<StepConfig>,
    #[serde(default)]
    pub config: CampaignConfig,
    #[serde(default)]
    pub stats: WorkflowStats,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("workflow `{workflow_id}` declares no steps")]
    EmptySteps { workflow_id: String },
    #[error("workflow `{workflow_id}` declares duplicate step id `{step_id}`")]
    DuplicateStepId {
        workflow_id: String,
        step_id: String,
    },
    #[error("workflow `{workflow_id}` step `{step_id}` branches to unknown step `{target}`")]
    UnknownBranchTarget {
        workflow_id: String,
        step_id: String,
        target: String,
    },
}

impl WorkflowDefinition {
    /// The first declared step is the entry point of the graph.
    pub fn entry_step(&self) -> Option<&StepConfig> {
        self.steps.first()
    }

    pub fn step(&self, id: &StepId) -> Option<&StepConfig> {
        self.steps.iter().find(|step| step.id == *id)
    }

    pub fn step_index(&self, id: &StepId) -> Option<usize> {
        self.steps.iter().position(|step| step.id == *id)
    }

    pub fn step_of_type(&self, step_type: StepType) -> Option<&StepConfig> {
        self.steps.iter().find(|step| step.step_type == step_type)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.steps.is_empty() {
            return Err(DefinitionError::EmptySteps {
                workflow_id: self.id.to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.clone()) {
                return Err(DefinitionError::DuplicateStepId {
                    workflow_id: self.id.to_string(),
                    step_id: step.id.to_string(),
                });
            }
        }
        for step in &self.steps {
            for target in [&step.next_on_success, &step.next_on_fail]
                .into_iter()
                .flatten()
            {
                if !seen.contains(target) {
                    return Err(DefinitionError::UnknownBranchTarget {
                        workflow_id: self.id.to_string(),
                        step_id: step.id.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn step(
    id: &str,
    step_type: StepType,
    name: &str,
    next_on_success: Option<&str>,
    next_on_fail: Option<&str>,
) -> StepConfig {
    StepConfig {
        id: StepId::parse(id).expect("default step id is valid"),
        step_type,
        name: name.to_string(),
        config: Map::new(),
        next_on_success: next_on_success
            .map(|raw| StepId::parse(raw).expect("default step id is valid")),
        next_on_fail: next_on_fail.map(|raw| StepId::parse(raw).expect("default step id is valid")),
    }
}

/// Built-in seed campaign, reconciled into the store on startup so fresh
/// installs and upgrades both see it without clobbering user edits.
pub fn default_definitions(now: i64) -> Vec<WorkflowDefinition> {
    vec![WorkflowDefinition {
        id: WorkflowId::parse("default_marketing").expect("default workflow id is valid"),
        name: "Default marketing campaign".to_string(),
        enabled: true,
        trigger: TriggerConfig::default(),
        steps: vec![
            step("evaluate", StepType::Evaluate, "Evaluate intent", Some("plan"), None),
            step(
                "plan",
                StepType::Plan,
                "Request AI plan",
                Some("private_chat"),
                Some("record"),
            ),
            step(
                "private_chat",
                StepType::PrivateChat,
                "Open private conversation",
                Some("detect_interest"),
                None,
            ),
            step(
                "detect_interest",
                StepType::DetectInterest,
                "Watch for buying interest",
                Some("create_group"),
                Some("record"),
            ),
            step(
                "create_group",
                StepType::CreateGroup,
                "Create service group",
                Some("group_marketing"),
                None,
            ),
            step(
                "group_marketing",
                StepType::GroupMarketing,
                "Run group marketing",
                Some("record"),
                None,
            ),
            step("record", StepType::Record, "Record outcome", None, None),
        ],
        config: CampaignConfig::default(),
        stats: WorkflowStats::default(),
        created_at: now,
        updated_at: now,
    }]
}
