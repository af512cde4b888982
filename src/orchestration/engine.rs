use crate::channel::{InboundEvent, MessageChannel, NotificationKind, Notifier, OutboundCommand};
use crate::interest::{
    self, InterestCategory, InterestSignal, ANALYSIS_CONTEXT_LINES,
    ANALYZE_INTEREST_TIMEOUT_SECONDS,
};
use crate::orchestration::error::OrchestratorError;
use crate::orchestration::execution::{
    Execution, ExecutionStatus, StepResult, StepResultStatus, StepWait,
};
use crate::orchestration::stats::{is_converted_outcome, record_conversion, record_trigger};
use crate::orchestration::steps::{
    run_step, StepOutcome, GROUP_TIMEOUT_ERROR, PLAN_TIMEOUT_ERROR, RELAXATION_DELAY_SECONDS,
};
use crate::orchestration::tracker::ExecutionTracker;
use crate::orchestration::trigger::{
    evaluate_candidate, uniform_delay_seconds, BehavioralEvent, CooldownTable, TriggerDecision,
};
use crate::shared::ids::{generate_execution_id, WorkflowId};
use crate::shared::logging::append_engine_log;
use crate::workflow::definition::{
    StepConfig, StepType, WorkflowDefinition, KEYWORD_MATCH_TRIGGER,
};
use crate::workflow::store::DefinitionStore;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

const EXECUTION_ID_ATTEMPTS: usize = 5;

/// Pending analyze-interest request correlated by execution id. Removing the
/// entry is what "deregisters the listener": a response or a deadline sweep
/// arriving second finds nothing and becomes a no-op.
#[derive(Debug, Clone)]
struct InterestProbe {
    message: String,
    deadline: i64,
}

#[derive(Default)]
struct EngineState {
    tracker: ExecutionTracker,
    cooldowns: CooldownTable,
    probes: BTreeMap<String, InterestProbe>,
}

/// Campaign orchestrator: reacts to inbound channel events, spawns and
/// advances executions, and keeps workflow statistics current.
///
/// All mutation of executions funnels through the single engine mutex, so a
/// given execution is only ever advanced by one caller at a time; the
/// trigger checks and execution creation share that same critical section.
pub struct Orchestrator {
    definitions: Arc<DefinitionStore>,
    channel: Arc<dyn MessageChannel>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<EngineState>,
}

impl Orchestrator {
    pub fn new(
        definitions: Arc<DefinitionStore>,
        channel: Arc<dyn MessageChannel>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            definitions,
            channel,
            notifier,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn definitions(&self) -> &DefinitionStore {
        &self.definitions
    }

    pub fn execution(&self, execution_id: &str) -> Option<Execution> {
        self.lock().tracker.get(execution_id).cloned()
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.lock().tracker.list()
    }

    pub fn active_execution_count(&self) -> usize {
        self.lock().tracker.active_count()
    }

    /// Entry point for every inbound channel event.
    pub fn on_event(&self, event: InboundEvent, now: i64) {
        match event {
            InboundEvent::KeywordMatched {
                user_id,
                username,
                message_preview,
            } => self.on_behavioral_event(
                &BehavioralEvent {
                    category: KEYWORD_MATCH_TRIGGER.to_string(),
                    user_id,
                    username,
                    message_preview,
                },
                now,
            ),
            InboundEvent::PrivateMessageReceived {
                user_id, message, ..
            } => self.on_private_message(&user_id, &message, now),
            InboundEvent::AiPlanResult {
                execution_id,
                success,
                plan,
                error,
            } => self.on_plan_result(&execution_id, success, plan, error, now),
            InboundEvent::GroupCreated {
                execution_id,
                success,
                group_id,
                error,
            } => self.on_group_created(&execution_id, success, group_id, error, now),
            InboundEvent::AnalyzeInterestResult {
                execution_id,
                success,
                has_interest,
                signal_type,
                key_phrase,
                confidence,
            } => self.on_analyze_interest_result(
                &execution_id,
                success,
                has_interest,
                signal_type,
                key_phrase,
                confidence,
                now,
            ),
            InboundEvent::CollaborationSessionCompleted {
                execution_id,
                session_id,
                outcome,
            } => self.on_session_completed(&execution_id, &session_id, &outcome, now),
        }
    }

    /// Evaluate every enabled matching workflow against the event. A bad
    /// candidate never aborts the sweep: errors are logged and the workflow
    /// is skipped.
    pub fn on_behavioral_event(&self, event: &BehavioralEvent, now: i64) {
        if event.user_id.is_empty() || event.message_preview.is_empty() {
            self.log(format!("ts={now} decision=drop reason=malformed_event"));
            return;
        }
        let candidates = self.definitions.enabled_for_trigger(&event.category);
        if candidates.is_empty() {
            return;
        }
        let mut state = self.lock();
        for definition in candidates {
            match evaluate_candidate(&definition, &state.tracker, &state.cooldowns, event, now) {
                TriggerDecision::Skip(reason) => {
                    self.log(format!(
                        "ts={now} workflow_id={} user_id={} decision=skip reason={reason}",
                        definition.id, event.user_id
                    ));
                }
                TriggerDecision::Fire { score } => {
                    match self.start_execution(
                        &mut state,
                        &definition,
                        &event.user_id,
                        event.display_name(),
                        None,
                        now,
                    ) {
                        Ok(execution_id) => {
                            self.log(format!(
                                "ts={now} workflow_id={} user_id={} decision=fire score={score} execution_id={execution_id}",
                                definition.id, event.user_id
                            ));
                        }
                        Err(err) => {
                            self.log(format!(
                                "ts={now} workflow_id={} user_id={} decision=error error={err}",
                                definition.id, event.user_id
                            ));
                        }
                    }
                }
            }
        }
    }

    /// Manual/test trigger: bypasses cooldown and intent scoring but keeps
    /// the duplicate-execution check, and runs the first step immediately.
    pub fn trigger_manual(
        &self,
        workflow_id: &WorkflowId,
        user_id: &str,
        username: Option<&str>,
        now: i64,
    ) -> Result<String, OrchestratorError> {
        let definition =
            self.definitions
                .get(workflow_id)
                .ok_or_else(|| OrchestratorError::UnknownWorkflow {
                    workflow_id: workflow_id.to_string(),
                })?;
        if !definition.enabled {
            return Err(OrchestratorError::WorkflowDisabled {
                workflow_id: workflow_id.to_string(),
            });
        }
        let mut state = self.lock();
        if state.tracker.active_for_user(user_id).is_some() {
            return Err(OrchestratorError::DuplicateExecution {
                user_id: user_id.to_string(),
            });
        }
        let display_name = username.unwrap_or(user_id).to_string();
        let execution_id =
            self.start_execution(&mut state, &definition, user_id, &display_name, Some(0), now)?;
        self.log(format!(
            "ts={now} workflow_id={workflow_id} user_id={user_id} decision=manual_fire execution_id={execution_id}"
        ));
        self.advance(&mut state, &execution_id, now);
        Ok(execution_id)
    }

    /// Sweep due delays, expired correlated waits, and expired interest
    /// probes. Driven by the runtime worker with the wall clock, or by tests
    /// with a simulated one.
    pub fn tick(&self, now: i64) {
        let mut state = self.lock();
        for execution_id in state.tracker.waiting_ids() {
            let wait = state
                .tracker
                .get(&execution_id)
                .and_then(|execution| execution.wait.clone());
            match wait {
                Some(StepWait::Delay { resume_at }) if now >= resume_at => {
                    self.advance(&mut state, &execution_id, now);
                }
                Some(StepWait::PlanResult { deadline }) if now >= deadline => {
                    self.log(format!(
                        "ts={now} execution_id={execution_id} decision=timeout wait=plan_result"
                    ));
                    self.fail_wait(&mut state, &execution_id, PLAN_TIMEOUT_ERROR, now);
                }
                Some(StepWait::GroupCreated { deadline }) if now >= deadline => {
                    self.log(format!(
                        "ts={now} execution_id={execution_id} decision=timeout wait=group_created"
                    ));
                    if let Some(execution) = state.tracker.get(&execution_id) {
                        self.notifier.notify(
                            NotificationKind::Warning,
                            &format!(
                                "group creation timed out for {}",
                                execution.target_user_name
                            ),
                        );
                    }
                    self.fail_wait(&mut state, &execution_id, GROUP_TIMEOUT_ERROR, now);
                }
                _ => {}
            }
        }

        let expired: Vec<String> = state
            .probes
            .iter()
            .filter(|(_, probe)| now >= probe.deadline)
            .map(|(execution_id, _)| execution_id.clone())
            .collect();
        for execution_id in expired {
            state.probes.remove(&execution_id);
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=timeout wait=analyze_interest"
            ));
        }
    }

    /// Cancellation is terminal; in-flight waits are dropped and any later
    /// correlated response for this execution is discarded.
    pub fn cancel(&self, execution_id: &str, now: i64) -> Result<(), OrchestratorError> {
        let mut state = self.lock();
        let execution = state.tracker.get_mut(execution_id).ok_or_else(|| {
            OrchestratorError::UnknownExecution {
                execution_id: execution_id.to_string(),
            }
        })?;
        if execution.status.is_terminal() {
            return Err(OrchestratorError::TerminalExecution {
                execution_id: execution_id.to_string(),
                status: execution.status,
            });
        }
        execution.status = ExecutionStatus::Cancelled;
        execution.wait = None;
        execution.completed_at = Some(now);
        execution.updated_at = now;
        state.probes.remove(execution_id);
        self.log(format!(
            "ts={now} execution_id={execution_id} decision=cancelled"
        ));
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn log(&self, line: String) {
        append_engine_log(self.definitions.state_root(), &line);
    }

    fn start_execution(
        &self,
        state: &mut EngineState,
        definition: &WorkflowDefinition,
        user_id: &str,
        display_name: &str,
        delay_override: Option<u64>,
        now: i64,
    ) -> Result<String, OrchestratorError> {
        let entry = definition.entry_step().ok_or_else(|| {
            OrchestratorError::TriggerDispatch("workflow declares no steps".to_string())
        })?;
        let execution_id = allocate_execution_id(&state.tracker, now)?;
        let delay_seconds = match delay_override {
            Some(seconds) => seconds,
            None => uniform_delay_seconds(&definition.config.first_contact_delay)
                .map_err(OrchestratorError::TriggerDispatch)?,
        };
        state.tracker.insert(Execution {
            id: execution_id.clone(),
            workflow_id: definition.id.clone(),
            target_user_id: user_id.to_string(),
            target_user_name: display_name.to_string(),
            current_step: entry.id.clone(),
            status: ExecutionStatus::Pending,
            step_results: BTreeMap::new(),
            ai_plan_result: None,
            group_id: None,
            session_id: None,
            outcome: None,
            recent_messages: Vec::new(),
            wait: Some(StepWait::Delay {
                resume_at: now + delay_seconds as i64,
            }),
            started_at: now,
            updated_at: now,
            completed_at: None,
        });
        state.cooldowns.stamp(user_id, now);
        record_trigger(&self.definitions, &definition.id, now)?;
        self.notifier.notify(
            NotificationKind::Info,
            &format!("campaign `{}` triggered for {display_name}", definition.name),
        );
        Ok(execution_id)
    }

    /// Advance one execution by one step. A missing execution, workflow, or
    /// step is a silent no-op: the execution may have been cancelled or its
    /// definition edited underneath us.
    fn advance(&self, state: &mut EngineState, execution_id: &str, now: i64) {
        let snapshot = match state.tracker.get(execution_id) {
            Some(execution) if execution.is_active() => execution.clone(),
            _ => return,
        };
        let Some(definition) = self.definitions.get(&snapshot.workflow_id) else {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=abort reason=missing_workflow"
            ));
            return;
        };
        let Some(step) = definition.step(&snapshot.current_step).cloned() else {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=abort reason=missing_step step_id={}",
                snapshot.current_step
            ));
            return;
        };
        if let Some(execution) = state.tracker.get_mut(execution_id) {
            execution.status = ExecutionStatus::Running;
            execution.wait = None;
            execution.updated_at = now;
        }
        match run_step(self.channel.as_ref(), &snapshot, &definition, &step, now) {
            Ok(StepOutcome::Done(result)) => {
                self.apply_step_result(state, execution_id, &step, result, now);
            }
            Ok(StepOutcome::Wait(wait)) => {
                self.log(format!(
                    "ts={now} execution_id={execution_id} step_id={} decision=parked",
                    step.id
                ));
                if let Some(execution) = state.tracker.get_mut(execution_id) {
                    execution.wait = Some(wait);
                }
            }
            Err(err) => {
                // Handler failure is terminal for the execution; branch
                // resolution is reserved for recorded step results.
                self.log(format!(
                    "ts={now} execution_id={execution_id} step_id={} decision=handler_error error={err}",
                    step.id
                ));
                if let Some(execution) = state.tracker.get_mut(execution_id) {
                    execution
                        .step_results
                        .insert(step.id.clone(), StepResult::failed(err.to_string(), now));
                    execution.status = ExecutionStatus::Failed;
                    execution.wait = None;
                    execution.completed_at = Some(now);
                    execution.updated_at = now;
                }
            }
        }
    }

    /// Record a step result and resolve the branch pointer. A missing branch
    /// terminates the execution: completed after success/skip, failed after
    /// a failed result.
    fn apply_step_result(
        &self,
        state: &mut EngineState,
        execution_id: &str,
        step: &StepConfig,
        result: StepResult,
        now: i64,
    ) {
        let failed = result.status == StepResultStatus::Failed;
        let Some(execution) = state.tracker.get_mut(execution_id) else {
            return;
        };
        if !execution.is_active() {
            return;
        }
        execution.step_results.insert(step.id.clone(), result);
        execution.updated_at = now;
        let next = if failed {
            step.next_on_fail.clone()
        } else {
            step.next_on_success.clone()
        };
        match next {
            Some(next_id) => {
                execution.current_step = next_id.clone();
                execution.wait = Some(StepWait::Delay {
                    resume_at: now + RELAXATION_DELAY_SECONDS,
                });
                self.log(format!(
                    "ts={now} execution_id={execution_id} step_id={} decision=advance next={next_id}",
                    step.id
                ));
            }
            None => {
                execution.wait = None;
                execution.completed_at = Some(now);
                execution.status = if failed {
                    ExecutionStatus::Failed
                } else {
                    ExecutionStatus::Completed
                };
                let status = execution.status;
                self.log(format!(
                    "ts={now} execution_id={execution_id} step_id={} decision=terminal status={status}",
                    step.id
                ));
            }
        }
    }

    /// Resolve the current step of an execution and apply `result` to it.
    /// Used by correlated completions and wait timeouts.
    fn resolve_and_apply(
        &self,
        state: &mut EngineState,
        execution_id: &str,
        result: StepResult,
        now: i64,
    ) {
        let Some((workflow_id, current_step)) = state
            .tracker
            .get(execution_id)
            .filter(|execution| execution.is_active())
            .map(|execution| (execution.workflow_id.clone(), execution.current_step.clone()))
        else {
            return;
        };
        let step = self
            .definitions
            .get(&workflow_id)
            .and_then(|definition| definition.step(&current_step).cloned());
        match step {
            Some(step) => {
                self.apply_step_result(state, execution_id, &step, result, now);
            }
            None => {
                if let Some(execution) = state.tracker.get_mut(execution_id) {
                    execution.status = ExecutionStatus::Failed;
                    execution.wait = None;
                    execution.completed_at = Some(now);
                    execution.updated_at = now;
                }
            }
        }
    }

    fn fail_wait(&self, state: &mut EngineState, execution_id: &str, error: &str, now: i64) {
        if let Some(execution) = state.tracker.get_mut(execution_id) {
            execution.wait = None;
        }
        self.resolve_and_apply(state, execution_id, StepResult::failed(error, now), now);
    }

    fn on_plan_result(
        &self,
        execution_id: &str,
        success: bool,
        plan: Option<Value>,
        error: Option<String>,
        now: i64,
    ) {
        if execution_id.is_empty() {
            return;
        }
        let mut state = self.lock();
        let waiting = matches!(
            state.tracker.get(execution_id),
            Some(execution)
                if execution.is_active()
                    && matches!(execution.wait, Some(StepWait::PlanResult { .. }))
        );
        if !waiting {
            // The timeout won the race or the execution was cancelled.
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=stale event=ai-plan-result"
            ));
            return;
        }
        let result = if success {
            if let Some(execution) = state.tracker.get_mut(execution_id) {
                execution.ai_plan_result = plan.clone();
                execution.wait = None;
            }
            StepResult::success_with(plan.unwrap_or(Value::Null), now)
        } else {
            if let Some(execution) = state.tracker.get_mut(execution_id) {
                execution.wait = None;
            }
            StepResult::failed(error.unwrap_or_else(|| "planning failed".to_string()), now)
        };
        self.resolve_and_apply(&mut state, execution_id, result, now);
    }

    fn on_group_created(
        &self,
        execution_id: &str,
        success: bool,
        group_id: Option<String>,
        error: Option<String>,
        now: i64,
    ) {
        if execution_id.is_empty() {
            return;
        }
        let mut state = self.lock();
        let waiting = matches!(
            state.tracker.get(execution_id),
            Some(execution)
                if execution.is_active()
                    && matches!(execution.wait, Some(StepWait::GroupCreated { .. }))
        );
        if !waiting {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=stale event=group-created"
            ));
            return;
        }
        let result = match (success, group_id) {
            (true, Some(group_id)) => {
                let user_name = state
                    .tracker
                    .get_mut(execution_id)
                    .map(|execution| {
                        execution.group_id = Some(group_id.clone());
                        execution.wait = None;
                        execution.target_user_name.clone()
                    })
                    .unwrap_or_default();
                self.notifier.notify(
                    NotificationKind::Success,
                    &format!("marketing group {group_id} is ready for {user_name}"),
                );
                StepResult::success_with(serde_json::json!({ "groupId": group_id }), now)
            }
            _ => {
                if let Some(execution) = state.tracker.get_mut(execution_id) {
                    execution.wait = None;
                }
                let reason = error.unwrap_or_else(|| "group creation failed".to_string());
                self.notifier.notify(
                    NotificationKind::Warning,
                    &format!("group creation failed: {reason}"),
                );
                StepResult::failed(reason, now)
            }
        };
        self.resolve_and_apply(&mut state, execution_id, result, now);
    }

    /// Private-conversation message for a targeted user: remember it as
    /// analysis context and look for buying interest. A confident heuristic
    /// hit short-circuits; otherwise an AI analysis request goes out with a
    /// five-second deadline.
    fn on_private_message(&self, user_id: &str, message: &str, now: i64) {
        if user_id.is_empty() || message.is_empty() {
            return;
        }
        let mut state = self.lock();
        let Some(execution_id) = state
            .tracker
            .active_for_user(user_id)
            .map(|execution| execution.id.clone())
        else {
            return;
        };
        let Some((workflow_id, current_step)) = state
            .tracker
            .get_mut(&execution_id)
            .map(|execution| {
                execution.push_recent_message(message);
                execution.updated_at = now;
                (execution.workflow_id.clone(), execution.current_step.clone())
            })
        else {
            return;
        };
        let Some(definition) = self.definitions.get(&workflow_id) else {
            return;
        };
        let conversation_stage = definition
            .step(&current_step)
            .map(|step| {
                matches!(
                    step.step_type,
                    StepType::PrivateChat | StepType::DetectInterest
                )
            })
            .unwrap_or(false);
        if !conversation_stage {
            return;
        }
        match interest::detect(message, now) {
            Some(signal) => {
                if definition.config.interest_signals.contains(&signal.category) {
                    self.log(format!(
                        "ts={now} execution_id={execution_id} decision=interest signal={}",
                        signal.category
                    ));
                    self.fast_forward(&mut state, &execution_id, &definition, &signal, now);
                } else {
                    self.log(format!(
                        "ts={now} execution_id={execution_id} decision=interest_ignored signal={}",
                        signal.category
                    ));
                }
            }
            None => {
                let context: Vec<String> = state
                    .tracker
                    .get(&execution_id)
                    .map(|execution| {
                        let lines = &execution.recent_messages;
                        lines
                            .iter()
                            .rev()
                            .take(ANALYSIS_CONTEXT_LINES)
                            .rev()
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                let send = self.channel.send(OutboundCommand::AnalyzeInterest {
                    message: message.to_string(),
                    context,
                    execution_id: execution_id.clone(),
                });
                match send {
                    Ok(()) => {
                        state.probes.insert(
                            execution_id.clone(),
                            InterestProbe {
                                message: message.to_string(),
                                deadline: now + ANALYZE_INTEREST_TIMEOUT_SECONDS,
                            },
                        );
                        self.log(format!(
                            "ts={now} execution_id={execution_id} decision=analyze_interest"
                        ));
                    }
                    Err(err) => {
                        self.log(format!(
                            "ts={now} execution_id={execution_id} decision=error error={err}"
                        ));
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn on_analyze_interest_result(
        &self,
        execution_id: &str,
        success: bool,
        has_interest: bool,
        signal_type: Option<String>,
        key_phrase: Option<String>,
        confidence: Option<f64>,
        now: i64,
    ) {
        if execution_id.is_empty() {
            return;
        }
        let mut state = self.lock();
        let Some(probe) = state.probes.remove(execution_id) else {
            // Probe already expired or was never registered.
            return;
        };
        if !(success && has_interest) {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=no_interest"
            ));
            return;
        }
        let Some(category) = signal_type.as_deref().and_then(InterestCategory::parse) else {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=drop reason=unknown_signal_type"
            ));
            return;
        };
        let Some(workflow_id) = state
            .tracker
            .get(execution_id)
            .filter(|execution| execution.is_active())
            .map(|execution| execution.workflow_id.clone())
        else {
            return;
        };
        let Some(definition) = self.definitions.get(&workflow_id) else {
            return;
        };
        if !definition.config.interest_signals.contains(&category) {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=interest_ignored signal={category}"
            ));
            return;
        }
        let signal = InterestSignal {
            category,
            keyword: key_phrase.unwrap_or_default(),
            confidence: confidence.unwrap_or(0.5),
            message: probe.message,
            detected_at: now,
        };
        self.log(format!(
            "ts={now} execution_id={execution_id} decision=interest signal={category} source=ai"
        ));
        self.fast_forward(&mut state, execution_id, &definition, &signal, now);
    }

    /// Buying interest detected mid-conversation: record the
    /// detect-interest step as succeeded and jump straight to group
    /// creation, skipping the natural branch walk.
    fn fast_forward(
        &self,
        state: &mut EngineState,
        execution_id: &str,
        definition: &WorkflowDefinition,
        signal: &InterestSignal,
        now: i64,
    ) {
        let Some(execution) = state.tracker.get(execution_id) else {
            return;
        };
        if !execution.is_active() {
            return;
        }
        let Some(create_step) = definition.step_of_type(StepType::CreateGroup) else {
            self.log(format!(
                "ts={now} execution_id={execution_id} decision=skip_fast_forward reason=no_create_group_step"
            ));
            return;
        };
        let current_index = definition.step_index(&execution.current_step).unwrap_or(0);
        let create_index = definition
            .step_index(&create_step.id)
            .unwrap_or(usize::MAX);
        if current_index >= create_index {
            return;
        }
        let create_step_id = create_step.id.clone();
        let detect_step_id = definition
            .step_of_type(StepType::DetectInterest)
            .map(|step| step.id.clone());
        if let Some(execution) = state.tracker.get_mut(execution_id) {
            if let Some(detect_step_id) = detect_step_id {
                execution.step_results.insert(
                    detect_step_id,
                    StepResult::success_with(
                        serde_json::to_value(signal).unwrap_or(Value::Null),
                        now,
                    ),
                );
            }
            execution.current_step = create_step_id;
            execution.wait = None;
            execution.updated_at = now;
        }
        state.probes.remove(execution_id);
        self.log(format!(
            "ts={now} execution_id={execution_id} decision=fast_forward target=create_group"
        ));
        self.advance(state, execution_id, now);
    }

    /// Group collaboration finished: stamp the session outcome on the
    /// execution and count conversions.
    fn on_session_completed(&self, execution_id: &str, session_id: &str, outcome: &str, now: i64) {
        if execution_id.is_empty() || session_id.is_empty() {
            return;
        }
        let workflow_id = {
            let mut state = self.lock();
            let Some(execution) = state.tracker.get_mut(execution_id) else {
                return;
            };
            execution.session_id = Some(session_id.to_string());
            execution.outcome = Some(outcome.to_string());
            execution.updated_at = now;
            execution.workflow_id.clone()
        };
        self.log(format!(
            "ts={now} execution_id={execution_id} decision=session_completed outcome={outcome}"
        ));
        if is_converted_outcome(outcome) {
            if let Err(err) = record_conversion(&self.definitions, &workflow_id, now) {
                self.log(format!(
                    "ts={now} execution_id={execution_id} decision=error error={err}"
                ));
            }
        }
    }
}

fn allocate_execution_id(
    tracker: &ExecutionTracker,
    now: i64,
) -> Result<String, OrchestratorError> {
    for _ in 0..EXECUTION_ID_ATTEMPTS {
        let execution_id =
            generate_execution_id(now).map_err(OrchestratorError::TriggerDispatch)?;
        if !tracker.contains(&execution_id) {
            return Ok(execution_id);
        }
    }
    Err(OrchestratorError::TriggerDispatch(format!(
        "failed to allocate a unique execution id after {EXECUTION_ID_ATTEMPTS} attempts"
    )))
}
