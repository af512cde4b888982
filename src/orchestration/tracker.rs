use crate::orchestration::execution::Execution;
use std::collections::BTreeMap;

/// Owns every execution for the lifetime of the process. Executions are
/// kept after they terminate so outcome queries and contact history remain
/// answerable; restart forgets them along with the cooldown table.
#[derive(Debug, Default)]
pub struct ExecutionTracker {
    executions: BTreeMap<String, Execution>,
}

impl ExecutionTracker {
    pub fn insert(&mut self, execution: Execution) {
        self.executions.insert(execution.id.clone(), execution);
    }

    pub fn get(&self, execution_id: &str) -> Option<&Execution> {
        self.executions.get(execution_id)
    }

    pub fn get_mut(&mut self, execution_id: &str) -> Option<&mut Execution> {
        self.executions.get_mut(execution_id)
    }

    pub fn contains(&self, execution_id: &str) -> bool {
        self.executions.contains_key(execution_id)
    }

    pub fn list(&self) -> Vec<Execution> {
        self.executions.values().cloned().collect()
    }

    /// Live count of pending/running executions; this is the derived
    /// `activeExecutions` figure, recomputed on every read.
    pub fn active_count(&self) -> usize {
        self.executions
            .values()
            .filter(|execution| execution.is_active())
            .count()
    }

    pub fn active_for_user(&self, user_id: &str) -> Option<&Execution> {
        self.executions
            .values()
            .find(|execution| execution.is_active() && execution.target_user_id == user_id)
    }

    /// Whether the user was ever targeted by a campaign, active or not.
    pub fn has_history_for_user(&self, user_id: &str) -> bool {
        self.executions
            .values()
            .any(|execution| execution.target_user_id == user_id)
    }

    /// Ids of executions whose wait state may be due; collected first so the
    /// sweep can mutate entries while iterating its own snapshot.
    pub fn waiting_ids(&self) -> Vec<String> {
        self.executions
            .values()
            .filter(|execution| execution.is_active() && execution.wait.is_some())
            .map(|execution| execution.id.clone())
            .collect()
    }
}
