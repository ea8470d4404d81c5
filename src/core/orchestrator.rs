//! Main orchestrator for workflow execution.
//!
//! Drives one execution through the workflow's states, invoking capabilities
//! for task states, routing choice states, and enforcing the execution
//! deadline and limits.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::CapabilityRegistry;
use crate::domain::{
    correlation_key, Event, EventType, Execution, ExecutionOutcome, ExecutionReport,
    FailureCause, Payload,
};

use super::condition::Predicate;
use super::limits::{Deadline, ExecutionLimits};
use super::workflow::{ChoiceState, ErrorPolicy, State, TaskState, Workflow, WorkflowError};

/// Payload field a caught task error is written to
pub const ERROR_FIELD: &str = "error";

/// Workflow orchestrator
///
/// Holds one validated workflow and the capability handles it calls. Each
/// call to [`Orchestrator::start_execution`] is independent; executions
/// share no mutable state and may run concurrently.
pub struct Orchestrator {
    workflow: Arc<Workflow>,
    capabilities: CapabilityRegistry,
}

impl Orchestrator {
    /// Create an orchestrator, validating the workflow against the registry
    pub fn new(workflow: Workflow, capabilities: CapabilityRegistry) -> Result<Self, WorkflowError> {
        workflow.validate()?;
        workflow.validate_capabilities(&capabilities)?;
        debug!(
            workflow = %workflow.name,
            capabilities = ?capabilities.keys().collect::<Vec<_>>(),
            "Orchestrator ready"
        );

        Ok(Self {
            workflow: Arc::new(workflow),
            capabilities,
        })
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    /// Run the workflow to completion and return the caller's result
    pub async fn run(&self, input: Payload) -> Result<Payload, FailureCause> {
        self.start_execution(input).await.outcome.into_result()
    }

    /// Execute the workflow with the given input payload
    #[instrument(skip(self, input), fields(workflow = %self.workflow.name))]
    pub async fn start_execution(&self, input: Payload) -> ExecutionReport {
        let limits = &self.workflow.limits;
        let execution_id = Uuid::new_v4();
        let deadline = Deadline::start(limits.timeout());
        let max_duration = chrono::Duration::from_std(limits.timeout())
            .unwrap_or_else(|_| chrono::Duration::weeks(52));

        let mut execution = Execution::new(
            execution_id,
            self.workflow.name.clone(),
            self.workflow.start_at.clone(),
            input,
            max_duration,
        );
        info!(%execution_id, "Starting workflow execution");

        let digest = execution.input.digest();
        execution.record(Event::new(
            execution_id,
            None,
            EventType::ExecutionStarted,
            format!("{}:start:{}", execution_id, digest),
            format!("Workflow '{}' started", self.workflow.name),
        ));

        let result =
            tokio::time::timeout_at(deadline.expires_at(), self.drive(&mut execution, limits))
                .await;

        match result {
            Ok(Ok(payload)) => self.complete(execution, payload),
            Ok(Err(cause)) => self.fail(execution, cause),
            Err(_) => {
                // In-flight invocation was dropped with the drive future
                let cause = FailureCause::Timeout {
                    state: execution.current_state.clone(),
                    limit_seconds: limits.timeout_seconds,
                };
                error!(
                    state = %execution.current_state,
                    elapsed_ms = deadline.elapsed().as_millis() as u64,
                    "Execution timed out"
                );
                execution.record(
                    Event::new(
                        execution_id,
                        Some(execution.current_state.clone()),
                        EventType::ExecutionTimedOut,
                        format!("{}:complete", execution_id),
                        format!("Execution timed out after {}s", limits.timeout_seconds),
                    )
                    .with_error(cause.to_string()),
                );
                execution.finish(ExecutionOutcome::Failed { cause })
            }
        }
    }

    /// Walk states until a terminal state is reached
    async fn drive(
        &self,
        execution: &mut Execution,
        limits: &ExecutionLimits,
    ) -> Result<Payload, FailureCause> {
        limits
            .validate_payload(&execution.payload)
            .map_err(|v| FailureCause::LimitExceeded {
                state: execution.current_state.clone(),
                limit: v.to_string(),
            })?;

        loop {
            let state = self
                .workflow
                .state(&execution.current_state)
                .ok_or_else(|| FailureCause::FailState {
                    state: execution.current_state.clone(),
                    error: "UnknownState".to_string(),
                    cause: "state is not defined in the workflow".to_string(),
                })?;

            let key = correlation_key(execution.id, state.name(), &execution.payload.digest());
            execution.record(Event::new(
                execution.id,
                Some(state.name().to_string()),
                EventType::StateEntered,
                key.clone(),
                format!("Entered state '{}'", state.name()),
            ));
            debug!(state = %state.name(), "Entered state");

            let next = match state {
                State::Task(task) => match self.run_task(execution, task, key, limits).await? {
                    Some(next) => next,
                    None => return Ok(execution.payload.clone()),
                },
                State::Choice(choice) => self.evaluate_choice(execution, choice, key),
                State::Succeed { .. } => return Ok(execution.payload.clone()),
                State::Fail { name, error, cause } => {
                    return Err(FailureCause::FailState {
                        state: name.clone(),
                        error: error.clone(),
                        cause: cause.clone(),
                    });
                }
            };

            limits
                .check_transitions(execution.transitions)
                .map_err(|v| FailureCause::LimitExceeded {
                    state: execution.current_state.clone(),
                    limit: v.to_string(),
                })?;
            execution.transition_to(&next);
        }
    }

    /// Invoke a task's capability; returns the next state, or None to finish
    async fn run_task(
        &self,
        execution: &mut Execution,
        task: &TaskState,
        key: String,
        limits: &ExecutionLimits,
    ) -> Result<Option<String>, FailureCause> {
        let capability = self.capabilities.get(&task.capability).ok_or_else(|| {
            FailureCause::TaskFailed {
                state: task.name.clone(),
                error: crate::adapters::CapabilityError::Invocation(format!(
                    "capability '{}' is not registered",
                    task.capability
                )),
            }
        })?;

        let step_start = Instant::now();
        let result = capability.invoke(execution.payload.clone()).await;
        let duration_ms = step_start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                limits
                    .validate_payload(&output)
                    .map_err(|v| FailureCause::LimitExceeded {
                        state: task.name.clone(),
                        limit: v.to_string(),
                    })?;

                execution.record(
                    Event::new(
                        execution.id,
                        Some(task.name.clone()),
                        EventType::TaskSucceeded,
                        key,
                        format!(
                            "Task '{}' ({}) completed in {}ms",
                            task.name,
                            capability.name(),
                            duration_ms
                        ),
                    )
                    .with_duration(duration_ms),
                );
                info!(state = %task.name, duration_ms, "Task completed");

                execution.payload = output;
                Ok(task.next.clone())
            }
            Err(err) => {
                execution.record(
                    Event::new(
                        execution.id,
                        Some(task.name.clone()),
                        EventType::TaskFailed,
                        key,
                        format!("Task '{}' failed after {}ms", task.name, duration_ms),
                    )
                    .with_duration(duration_ms)
                    .with_error(err.to_string()),
                );

                match &task.on_error {
                    ErrorPolicy::Fail => {
                        warn!(state = %task.name, error = %err, "Task failed");
                        Err(FailureCause::TaskFailed {
                            state: task.name.clone(),
                            error: err,
                        })
                    }
                    ErrorPolicy::Goto(target) => {
                        warn!(
                            state = %task.name,
                            error = %err,
                            %target,
                            "Task failed, routing to handler"
                        );
                        let mut detail = serde_json::to_value(&err).unwrap_or_else(|_| json!({}));
                        detail["state"] = json!(task.name);
                        execution.payload.insert(ERROR_FIELD, detail);
                        Ok(Some(target.clone()))
                    }
                }
            }
        }
    }

    /// Pick the next state of a choice; exactly one arm is taken
    fn evaluate_choice(&self, execution: &mut Execution, choice: &ChoiceState, key: String) -> String {
        let matched = choice
            .rules
            .iter()
            .position(|rule| rule.condition.evaluate(&execution.payload));

        let next = match matched {
            Some(idx) => choice.rules[idx].next.clone(),
            None => choice.default.clone(),
        };

        let summary = match matched {
            Some(idx) => format!("Rule {} matched, next '{}'", idx, next),
            None => format!("No rule matched, default '{}'", next),
        };
        execution.record(Event::new(
            execution.id,
            Some(choice.name.clone()),
            EventType::ChoiceEvaluated,
            key,
            summary,
        ));
        info!(state = %choice.name, %next, matched = matched.is_some(), "Choice evaluated");

        next
    }

    fn complete(&self, mut execution: Execution, payload: Payload) -> ExecutionReport {
        info!(execution_id = %execution.id, state = %execution.current_state, "Execution succeeded");

        execution.record(Event::new(
            execution.id,
            Some(execution.current_state.clone()),
            EventType::ExecutionSucceeded,
            format!("{}:complete", execution.id),
            format!("Workflow '{}' succeeded", execution.workflow_name),
        ));
        execution.finish(ExecutionOutcome::Succeeded { payload })
    }

    fn fail(&self, mut execution: Execution, cause: FailureCause) -> ExecutionReport {
        let error_msg = cause.to_string();
        error!(execution_id = %execution.id, %error_msg, "Execution failed");

        execution.record(
            Event::new(
                execution.id,
                Some(cause.state().to_string()),
                EventType::ExecutionFailed,
                format!("{}:complete", execution.id),
                format!("Workflow '{}' failed", execution.workflow_name),
            )
            .with_error(error_msg),
        );
        execution.finish(ExecutionOutcome::Failed { cause })
    }
}
