use campaigner::orchestration::stats::record_trigger;
use campaigner::shared::ids::WorkflowId;
use campaigner::storage::BlobStore;
use campaigner::workflow::definition::WorkflowDefinition;
use campaigner::workflow::store::{DefinitionStore, WorkflowStoreError, DEFINITIONS_STORE_KEY};
use tempfile::tempdir;

fn custom_workflow(id: &str) -> WorkflowDefinition {
    serde_yaml::from_str(&format!(
        r#"
id: {id}
name: Reseller outreach
enabled: true
trigger:
  type: keyword_match
  minIntentScore: 75
  cooldownMinutes: 60
config:
  marketingGoal: bring resellers into the partner program
  groupNameTemplate: "Partner lounge - {{user}}"
steps:
  - id: evaluate
    type: evaluate
    name: Evaluate
    nextOnSuccess: plan
  - id: plan
    type: plan
    name: Plan
    nextOnSuccess: record
    nextOnFail: record
  - id: record
    type: record
    name: Record
createdAt: 11
updatedAt: 11
"#
    ))
    .expect("workflow")
}

#[test]
fn persisted_definitions_survive_a_reopen_bit_for_bit() {
    let dir = tempdir().expect("tempdir");
    let workflow_id = WorkflowId::parse("reseller_outreach").expect("id");
    let original = {
        let store = DefinitionStore::open(BlobStore::new(dir.path()), 0).expect("open");
        store
            .insert(custom_workflow("reseller_outreach"))
            .expect("insert");
        record_trigger(&store, &workflow_id, 42).expect("trigger");
        record_trigger(&store, &workflow_id, 43).expect("trigger");
        store.get(&workflow_id).expect("definition")
    };

    let reopened = DefinitionStore::open(BlobStore::new(dir.path()), 999).expect("reopen");
    let loaded = reopened.get(&workflow_id).expect("definition");
    assert_eq!(loaded, original);
    assert_eq!(loaded.stats.total_triggers, 2);
    assert_eq!(loaded.stats.today_triggers, 2);
    assert_eq!(loaded.stats.last_triggered_at, Some(43));
    assert_eq!(loaded.steps.len(), 3);
    assert_eq!(loaded.trigger.min_intent_score, 75);
}

#[test]
fn reload_merges_new_defaults_without_touching_user_workflows() {
    let dir = tempdir().expect("tempdir");
    {
        // Seed the store with only a user-authored workflow, as if the
        // snapshot predated the built-in default.
        let blobs = BlobStore::new(dir.path());
        blobs
            .save(DEFINITIONS_STORE_KEY, &vec![custom_workflow("reseller_outreach")])
            .expect("seed");
    }
    let store = DefinitionStore::open(BlobStore::new(dir.path()), 500).expect("open");
    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 2);
    assert!(snapshot.iter().any(|d| d.id.as_str() == "reseller_outreach"));
    let default = snapshot
        .iter()
        .find(|d| d.id.as_str() == "default_marketing")
        .expect("default merged in");
    assert_eq!(default.created_at, 500);
}

#[test]
fn inserting_a_duplicate_workflow_id_is_rejected() {
    let dir = tempdir().expect("tempdir");
    let store = DefinitionStore::open(BlobStore::new(dir.path()), 0).expect("open");
    store
        .insert(custom_workflow("reseller_outreach"))
        .expect("insert");
    assert!(matches!(
        store.insert(custom_workflow("reseller_outreach")),
        Err(WorkflowStoreError::DuplicateWorkflow { .. })
    ));
}

#[test]
fn definitions_with_dangling_branches_never_enter_the_store() {
    let dir = tempdir().expect("tempdir");
    let store = DefinitionStore::open(BlobStore::new(dir.path()), 0).expect("open");
    let mut broken = custom_workflow("broken_flow");
    broken.steps[1].next_on_fail =
        Some(campaigner::shared::ids::StepId::parse("nowhere").expect("id"));
    assert!(matches!(
        store.insert(broken),
        Err(WorkflowStoreError::Definition(_))
    ));
    assert!(store
        .get(&WorkflowId::parse("broken_flow").expect("id"))
        .is_none());
}

#[test]
fn corrupt_persisted_definitions_fail_the_open() {
    let dir = tempdir().expect("tempdir");
    {
        let blobs = BlobStore::new(dir.path());
        let mut broken = custom_workflow("broken_flow");
        let duplicate = broken.steps[0].clone();
        broken.steps.push(duplicate);
        blobs
            .save(DEFINITIONS_STORE_KEY, &vec![broken])
            .expect("seed");
    }
    assert!(matches!(
        DefinitionStore::open(BlobStore::new(dir.path()), 0),
        Err(WorkflowStoreError::Definition(_))
    ));
}
