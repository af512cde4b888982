use crate::shared::ids::WorkflowId;
use crate::workflow::store::{DefinitionStore, WorkflowStoreError};
use chrono::DateTime;

/// Session outcomes that count as a conversion.
pub const CONVERTED_OUTCOMES: &[&str] = &["converted", "success"];

pub fn is_converted_outcome(outcome: &str) -> bool {
    CONVERTED_OUTCOMES.contains(&outcome)
}

/// Copy-on-write counter bump plus persistence flush. `todayTriggers`
/// restarts whenever the UTC calendar day changes between triggers.
pub fn record_trigger(
    definitions: &DefinitionStore,
    workflow_id: &WorkflowId,
    now: i64,
) -> Result<(), WorkflowStoreError> {
    definitions.update(workflow_id, now, |definition| {
        let stats = &mut definition.stats;
        stats.today_triggers = if same_utc_day(stats.last_triggered_at, now) {
            stats.today_triggers.saturating_add(1)
        } else {
            1
        };
        stats.total_triggers = stats.total_triggers.saturating_add(1);
        stats.last_triggered_at = Some(now);
    })
}

pub fn record_conversion(
    definitions: &DefinitionStore,
    workflow_id: &WorkflowId,
    now: i64,
) -> Result<(), WorkflowStoreError> {
    definitions.update(workflow_id, now, |definition| {
        definition.stats.conversions = definition.stats.conversions.saturating_add(1);
    })
}

fn same_utc_day(last: Option<i64>, now: i64) -> bool {
    let Some(last) = last else {
        return false;
    };
    match (
        DateTime::from_timestamp(last, 0),
        DateTime::from_timestamp(now, 0),
    ) {
        (Some(a), Some(b)) => a.date_naive() == b.date_naive(),
        _ => false,
    }
}
