use campaigner::channel::{InMemoryChannel, InboundEvent, NotificationKind, Notifier};
use campaigner::orchestration::engine::Orchestrator;
use campaigner::orchestration::error::OrchestratorError;
use campaigner::shared::ids::WorkflowId;
use campaigner::storage::BlobStore;
use campaigner::workflow::definition::WorkflowDefinition;
use campaigner::workflow::store::DefinitionStore;
use std::sync::{Arc, Mutex};
use tempfile::{tempdir, TempDir};

struct RecordingNotifier {
    events: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    fn events(&self) -> Vec<(NotificationKind, String)> {
        self.events.lock().expect("events").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, text: &str) {
        self.events
            .lock()
            .expect("events")
            .push((kind, text.to_string()));
    }
}

fn harness() -> (
    TempDir,
    Arc<Orchestrator>,
    Arc<InMemoryChannel>,
    Arc<RecordingNotifier>,
) {
    let dir = tempdir().expect("tempdir");
    let definitions =
        Arc::new(DefinitionStore::open(BlobStore::new(dir.path()), 0).expect("open store"));
    let channel = Arc::new(InMemoryChannel::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let orchestrator = Arc::new(Orchestrator::new(
        definitions,
        channel.clone(),
        notifier.clone(),
    ));
    (dir, orchestrator, channel, notifier)
}

fn keyword_event(user_id: &str, preview: &str) -> InboundEvent {
    InboundEvent::KeywordMatched {
        user_id: user_id.to_string(),
        username: Some(format!("{user_id}-name")),
        message_preview: preview.to_string(),
    }
}

fn default_id() -> WorkflowId {
    WorkflowId::parse("default_marketing").expect("id")
}

fn rapid_fire_workflow() -> WorkflowDefinition {
    serde_yaml::from_str(
        r#"
id: rapid_fire
name: Rapid fire follow-up
enabled: true
trigger:
  type: keyword_match
  cooldownMinutes: 10
config:
  firstContactDelay:
    min: 0
    max: 0
steps:
  - id: evaluate
    type: evaluate
    name: Evaluate
    nextOnSuccess: record
  - id: record
    type: record
    name: Record
createdAt: 0
updatedAt: 0
"#,
    )
    .expect("workflow")
}

#[test]
fn price_keyword_event_creates_a_pending_execution_and_counts_the_trigger() {
    let (_dir, orchestrator, channel, notifier) = harness();
    orchestrator.on_event(keyword_event("u1", "這個多少錢"), 10_000);

    let executions = orchestrator.executions();
    assert_eq!(executions.len(), 1);
    let execution = &executions[0];
    assert_eq!(execution.target_user_id, "u1");
    assert_eq!(execution.target_user_name, "u1-name");
    assert_eq!(execution.current_step.as_str(), "evaluate");
    assert_eq!(execution.status.to_string(), "pending");
    assert_eq!(orchestrator.active_execution_count(), 1);

    // Nothing runs before the randomized first-contact delay elapses.
    assert!(channel.sent().is_empty());

    let stats = orchestrator
        .definitions()
        .get(&default_id())
        .expect("definition")
        .stats;
    assert_eq!(stats.total_triggers, 1);
    assert_eq!(stats.today_triggers, 1);
    assert_eq!(stats.last_triggered_at, Some(10_000));

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, NotificationKind::Info);
}

#[test]
fn cooldown_blocks_a_replay_even_after_the_execution_ended() {
    let (_dir, orchestrator, _channel, _notifier) = harness();
    orchestrator.on_event(keyword_event("u1", "多少錢"), 10_000);
    let execution_id = orchestrator.executions()[0].id.clone();
    orchestrator.cancel(&execution_id, 10_100).expect("cancel");

    // Ten minutes later: dedup no longer applies, the cooldown still does.
    orchestrator.on_event(keyword_event("u1", "多少錢"), 10_600);
    assert_eq!(orchestrator.executions().len(), 1);
    let stats = orchestrator
        .definitions()
        .get(&default_id())
        .expect("definition")
        .stats;
    assert_eq!(stats.total_triggers, 1);

    // Full cooldown window elapsed: the same signal fires again.
    orchestrator.on_event(keyword_event("u1", "多少錢"), 10_000 + 1_440 * 60);
    assert_eq!(orchestrator.executions().len(), 2);
    let stats = orchestrator
        .definitions()
        .get(&default_id())
        .expect("definition")
        .stats;
    assert_eq!(stats.total_triggers, 2);
}

#[test]
fn low_intent_messages_never_trigger() {
    let (_dir, orchestrator, _channel, notifier) = harness();
    orchestrator.on_event(keyword_event("u1", "hello there"), 10_000);
    assert!(orchestrator.executions().is_empty());
    assert!(notifier.events().is_empty());
}

#[test]
fn malformed_events_are_dropped_silently() {
    let (_dir, orchestrator, _channel, _notifier) = harness();
    orchestrator.on_event(keyword_event("", "多少錢"), 10_000);
    orchestrator.on_event(keyword_event("u1", ""), 10_000);
    assert!(orchestrator.executions().is_empty());
}

#[test]
fn at_most_one_active_execution_per_user_across_workflows() {
    let (_dir, orchestrator, _channel, _notifier) = harness();
    orchestrator
        .definitions()
        .insert(rapid_fire_workflow())
        .expect("insert");

    // Two enabled workflows share the trigger type; a burst of signals for
    // one user still yields a single active execution.
    for offset in [0, 5, 10, 15] {
        orchestrator.on_event(keyword_event("u1", "想买，多少钱"), 20_000 + offset);
    }
    assert_eq!(orchestrator.executions().len(), 1);
    assert_eq!(orchestrator.active_execution_count(), 1);
}

#[test]
fn replayed_triggers_after_cooldown_count_twice_in_one_day() {
    let (_dir, orchestrator, _channel, _notifier) = harness();
    orchestrator
        .definitions()
        .set_enabled(&default_id(), false, 1)
        .expect("disable default");
    orchestrator
        .definitions()
        .insert(rapid_fire_workflow())
        .expect("insert");
    let rapid_id = WorkflowId::parse("rapid_fire").expect("id");

    orchestrator.on_event(keyword_event("u7", "多少錢"), 50_000);
    let first = orchestrator.executions()[0].id.clone();
    orchestrator.cancel(&first, 50_010).expect("cancel");

    // 700 seconds later the 10-minute cooldown has elapsed; same UTC day.
    orchestrator.on_event(keyword_event("u7", "多少錢"), 50_700);

    assert_eq!(orchestrator.executions().len(), 2);
    let stats = orchestrator
        .definitions()
        .get(&rapid_id)
        .expect("definition")
        .stats;
    assert_eq!(stats.total_triggers, 2);
    assert_eq!(stats.today_triggers, 2);
}

#[test]
fn manual_trigger_bypasses_cooldown_but_not_dedup() {
    let (_dir, orchestrator, _channel, _notifier) = harness();
    orchestrator.on_event(keyword_event("u2", "多少錢"), 30_000);
    let execution_id = orchestrator.executions()[0].id.clone();

    let duplicate = orchestrator.trigger_manual(&default_id(), "u2", Some("U2"), 30_050);
    assert!(matches!(
        duplicate,
        Err(OrchestratorError::DuplicateExecution { .. })
    ));

    orchestrator.cancel(&execution_id, 30_060).expect("cancel");

    // Cooldown is still active for u2; the manual path ignores it.
    let manual = orchestrator
        .trigger_manual(&default_id(), "u2", Some("U2"), 30_100)
        .expect("manual trigger");
    let execution = orchestrator.execution(&manual).expect("execution");
    assert_eq!(execution.target_user_name, "U2");
    assert_eq!(execution.status.to_string(), "running");
}

#[test]
fn manual_trigger_rejects_unknown_or_disabled_workflows() {
    let (_dir, orchestrator, _channel, _notifier) = harness();
    let missing = WorkflowId::parse("missing").expect("id");
    assert!(matches!(
        orchestrator.trigger_manual(&missing, "u1", None, 1_000),
        Err(OrchestratorError::UnknownWorkflow { .. })
    ));

    orchestrator
        .definitions()
        .set_enabled(&default_id(), false, 1_000)
        .expect("disable");
    assert!(matches!(
        orchestrator.trigger_manual(&default_id(), "u1", None, 1_000),
        Err(OrchestratorError::WorkflowDisabled { .. })
    ));
}
