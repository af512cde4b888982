use crate::shared::ids::WorkflowId;
use crate::storage::{BlobStore, StoreError};
use crate::workflow::definition::{default_definitions, DefinitionError, WorkflowDefinition};
use std::sync::{Arc, Mutex};

pub const DEFINITIONS_STORE_KEY: &str = "workflow-definitions";

type ChangeListener = Box<dyn Fn(&[WorkflowDefinition]) + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum WorkflowStoreError {
    #[error("unknown workflow `{workflow_id}`")]
    UnknownWorkflow { workflow_id: String },
    #[error("workflow `{workflow_id}` is already defined")]
    DuplicateWorkflow { workflow_id: String },
    #[error(transparent)]
    Definition(#[from] DefinitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Holds the workflow definitions as an immutable snapshot. Every mutation
/// builds a new snapshot, flushes it to the blob store, swaps it in, and
/// fans out a change notification; readers never observe a half-applied
/// update.
pub struct DefinitionStore {
    blobs: BlobStore,
    definitions: Mutex<Arc<Vec<WorkflowDefinition>>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl DefinitionStore {
    /// Load persisted definitions, validate them, and reconcile the built-in
    /// defaults: any default whose id is absent from the loaded set is
    /// appended, so upgrades surface new seed campaigns without clobbering
    /// user edits.
    pub fn open(blobs: BlobStore, now: i64) -> Result<Self, WorkflowStoreError> {
        let loaded: Vec<WorkflowDefinition> = blobs
            .load(DEFINITIONS_STORE_KEY)?
            .unwrap_or_default();
        for definition in &loaded {
            definition.validate()?;
        }

        let mut definitions = loaded;
        let mut appended = false;
        for default in default_definitions(now) {
            if !definitions.iter().any(|existing| existing.id == default.id) {
                definitions.push(default);
                appended = true;
            }
        }
        if appended || definitions.is_empty() {
            blobs.save(DEFINITIONS_STORE_KEY, &definitions)?;
        }

        Ok(Self {
            blobs,
            definitions: Mutex::new(Arc::new(definitions)),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn state_root(&self) -> &std::path::Path {
        self.blobs.state_root()
    }

    /// Cheap consistent snapshot of every definition.
    pub fn snapshot(&self) -> Arc<Vec<WorkflowDefinition>> {
        self.definitions
            .lock()
            .map(|definitions| definitions.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, id: &WorkflowId) -> Option<WorkflowDefinition> {
        self.snapshot()
            .iter()
            .find(|definition| definition.id == *id)
            .cloned()
    }

    pub fn enabled_for_trigger(&self, trigger_type: &str) -> Vec<WorkflowDefinition> {
        self.snapshot()
            .iter()
            .filter(|definition| definition.enabled && definition.trigger.trigger_type == trigger_type)
            .cloned()
            .collect()
    }

    pub fn insert(&self, definition: WorkflowDefinition) -> Result<(), WorkflowStoreError> {
        definition.validate()?;
        let mut next = self.snapshot().as_ref().clone();
        if next.iter().any(|existing| existing.id == definition.id) {
            return Err(WorkflowStoreError::DuplicateWorkflow {
                workflow_id: definition.id.to_string(),
            });
        }
        next.push(definition);
        self.commit(next)
    }

    pub fn set_enabled(
        &self,
        id: &WorkflowId,
        enabled: bool,
        now: i64,
    ) -> Result<(), WorkflowStoreError> {
        self.update(id, now, |definition| definition.enabled = enabled)
    }

    /// Copy-on-write update of a single definition followed by a persistence
    /// flush. `updated_at` is stamped here so callers cannot forget it.
    pub fn update<F>(&self, id: &WorkflowId, now: i64, mutate: F) -> Result<(), WorkflowStoreError>
    where
        F: FnOnce(&mut WorkflowDefinition),
    {
        let mut next = self.snapshot().as_ref().clone();
        let definition = next
            .iter_mut()
            .find(|definition| definition.id == *id)
            .ok_or_else(|| WorkflowStoreError::UnknownWorkflow {
                workflow_id: id.to_string(),
            })?;
        mutate(definition);
        definition.updated_at = now;
        self.commit(next)
    }

    pub fn subscribe(&self, listener: ChangeListener) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(listener);
        }
    }

    fn commit(&self, next: Vec<WorkflowDefinition>) -> Result<(), WorkflowStoreError> {
        self.blobs.save(DEFINITIONS_STORE_KEY, &next)?;
        let snapshot = Arc::new(next);
        if let Ok(mut definitions) = self.definitions.lock() {
            *definitions = snapshot.clone();
        }
        if let Ok(listeners) = self.listeners.lock() {
            for listener in listeners.iter() {
                listener(&snapshot);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::definition::KEYWORD_MATCH_TRIGGER;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    #[test]
    fn open_seeds_the_default_campaign() {
        let dir = tempdir().expect("tempdir");
        let store = DefinitionStore::open(BlobStore::new(dir.path()), 100).expect("open");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id.as_str(), "default_marketing");
        assert!(snapshot[0].enabled);
    }

    #[test]
    fn reopen_preserves_user_edits_without_duplicating_defaults() {
        let dir = tempdir().expect("tempdir");
        {
            let store = DefinitionStore::open(BlobStore::new(dir.path()), 100).expect("open");
            let id = WorkflowId::parse("default_marketing").expect("id");
            store.set_enabled(&id, false, 200).expect("disable");
        }
        let store = DefinitionStore::open(BlobStore::new(dir.path()), 300).expect("reopen");
        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].enabled);
        assert_eq!(snapshot[0].updated_at, 200);
    }

    #[test]
    fn enabled_for_trigger_filters_disabled_definitions() {
        let dir = tempdir().expect("tempdir");
        let store = DefinitionStore::open(BlobStore::new(dir.path()), 100).expect("open");
        assert_eq!(store.enabled_for_trigger(KEYWORD_MATCH_TRIGGER).len(), 1);
        let id = WorkflowId::parse("default_marketing").expect("id");
        store.set_enabled(&id, false, 200).expect("disable");
        assert!(store.enabled_for_trigger(KEYWORD_MATCH_TRIGGER).is_empty());
    }

    #[test]
    fn change_listeners_fire_on_commit() {
        let dir = tempdir().expect("tempdir");
        let store = DefinitionStore::open(BlobStore::new(dir.path()), 100).expect("open");
        static FIRED: AtomicUsize = AtomicUsize::new(0);
        store.subscribe(Box::new(|_| {
            FIRED.fetch_add(1, Ordering::SeqCst);
        }));
        let id = WorkflowId::parse("default_marketing").expect("id");
        store.set_enabled(&id, false, 200).expect("disable");
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn updating_an_unknown_workflow_fails() {
        let dir = tempdir().expect("tempdir");
        let store = DefinitionStore::open(BlobStore::new(dir.path()), 100).expect("open");
        let id = WorkflowId::parse("missing").expect("id");
        assert!(matches!(
            store.set_enabled(&id, false, 200),
            Err(WorkflowStoreError::UnknownWorkflow { .. })
        ));
    }
}
