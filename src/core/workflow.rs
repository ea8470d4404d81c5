//! Workflow definitions and loading.
//!
//! A workflow is an ordered list of states. Task states invoke a capability
//! and hand its output to their successor; choice states route on the
//! payload; succeed and fail states end the execution. Definitions can be
//! built in code or loaded from YAML.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{
    CapabilityRegistry, CAPABILITY_CLASSIFY, CAPABILITY_FETCH_RECORD, CAPABILITY_NOTIFY,
};

use super::condition::Condition;
use super::limits::{ExecutionLimits, MAX_TIMEOUT_SECONDS};

pub const STATE_FETCH_RECORD: &str = "FetchRecord";
pub const STATE_CLASSIFY: &str = "Classify";
pub const STATE_BRANCH: &str = "Branch";
pub const STATE_NOTIFY: &str = "Notify";
pub const STATE_SUCCESS: &str = "Success";

/// A complete workflow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow name
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub comment: String,

    /// Name of the first state
    pub start_at: String,

    /// Execution limits (timeout, transitions, payload size)
    #[serde(default)]
    pub limits: ExecutionLimits,

    /// States, in declaration order
    pub states: Vec<State>,
}

/// One node of a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum State {
    /// Invoke a capability with the whole payload
    Task(TaskState),

    /// Route on the payload
    Choice(ChoiceState),

    /// End the execution successfully with the current payload
    Succeed { name: String },

    /// End the execution with a failure
    Fail {
        name: String,
        #[serde(default)]
        error: String,
        #[serde(default)]
        cause: String,
    },
}

impl State {
    pub fn name(&self) -> &str {
        match self {
            Self::Task(task) => &task.name,
            Self::Choice(choice) => &choice.name,
            Self::Succeed { name } | Self::Fail { name, .. } => name,
        }
    }

    /// Names of the states this state can transition to
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Self::Task(task) => {
                let mut next: Vec<&str> = task.next.iter().map(String::as_str).collect();
                if let ErrorPolicy::Goto(target) = &task.on_error {
                    next.push(target);
                }
                next
            }
            Self::Choice(choice) => choice
                .rules
                .iter()
                .map(|r| r.next.as_str())
                .chain(std::iter::once(choice.default.as_str()))
                .collect(),
            Self::Succeed { .. } | Self::Fail { .. } => Vec::new(),
        }
    }
}

/// A step that calls one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskState {
    /// State name (unique within the workflow)
    pub name: String,

    /// Registry key of the capability to invoke
    pub capability: String,

    /// Next state (None ends the execution successfully)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,

    /// What to do when the capability fails
    #[serde(default, with = "serde_yaml::with::singleton_map")]
    pub on_error: ErrorPolicy,
}

impl TaskState {
    pub fn new(name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            next: None,
            on_error: ErrorPolicy::Fail,
        }
    }

    pub fn then(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }
}

/// Handling of a failed capability invocation
///
/// YAML: `on_error: fail` or `on_error: { goto: StateName }`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// End the execution with a task failure
    #[default]
    Fail,

    /// Record the error in the payload and continue at the named state
    Goto(String),
}

/// A branching step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceState {
    pub name: String,

    /// Rules, evaluated in order; the first match wins
    pub rules: Vec<ChoiceRule>,

    /// State taken when no rule matches
    pub default: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceRule {
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub condition: Condition,
    pub next: String,
}

/// Definition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Workflow name cannot be empty")]
    EmptyName,

    #[error("Workflow must have at least one state")]
    NoStates,

    #[error("State {0} has an empty name")]
    EmptyStateName(usize),

    #[error("Duplicate state name '{0}'")]
    DuplicateState(String),

    #[error("start_at references non-existent state '{0}'")]
    UnknownStart(String),

    #[error("State '{from}' references non-existent state '{to}'")]
    UnknownTarget { from: String, to: String },

    #[error("Choice state '{0}' has no rules")]
    EmptyChoice(String),

    #[error("Workflow timeout must be greater than zero")]
    ZeroTimeout,

    #[error("Workflow timeout of {actual}s exceeds the maximum of {max}s")]
    TimeoutTooLarge { actual: u64, max: u64 },

    #[error("State '{state}' uses unregistered capability '{capability}'")]
    UnknownCapability { state: String, capability: String },
}

impl Workflow {
    /// Load a workflow from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a workflow from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse workflow YAML")
    }

    /// Render the definition as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize workflow")
    }

    /// The fetch → classify → branch → (notify | success) workflow
    pub fn sentiment() -> Self {
        Self {
            name: "sentiment".to_string(),
            comment: "Fetch a record, classify its sentiment, notify when negative".to_string(),
            start_at: STATE_FETCH_RECORD.to_string(),
            limits: ExecutionLimits::default(),
            states: vec![
                State::Task(
                    TaskState::new(STATE_FETCH_RECORD, CAPABILITY_FETCH_RECORD)
                        .then(STATE_CLASSIFY),
                ),
                State::Task(TaskState::new(STATE_CLASSIFY, CAPABILITY_CLASSIFY).then(STATE_BRANCH)),
                State::Choice(ChoiceState {
                    name: STATE_BRANCH.to_string(),
                    rules: vec![ChoiceRule {
                        condition: Condition::string_equals("$.emotion", "NEGATIVE"),
                        next: STATE_NOTIFY.to_string(),
                    }],
                    default: STATE_SUCCESS.to_string(),
                }),
                State::Task(TaskState::new(STATE_NOTIFY, CAPABILITY_NOTIFY).then(STATE_SUCCESS)),
                State::Succeed {
                    name: STATE_SUCCESS.to_string(),
                },
            ],
        }
    }

    /// Get a state by name
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name() == name)
    }

    /// Capability keys referenced by task states, in declaration order
    pub fn capabilities(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter_map(|s| match s {
                State::Task(task) => Some(task.capability.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Validate the definition's structure
    pub fn validate(&self) -> Result<(), WorkflowError> {
        if self.name.is_empty() {
            return Err(WorkflowError::EmptyName);
        }

        if self.states.is_empty() {
            return Err(WorkflowError::NoStates);
        }

        if self.limits.timeout_seconds == 0 {
            return Err(WorkflowError::ZeroTimeout);
        }

        if self.limits.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(WorkflowError::TimeoutTooLarge {
                actual: self.limits.timeout_seconds,
                max: MAX_TIMEOUT_SECONDS,
            });
        }

        let mut names = HashSet::new();
        for (i, state) in self.states.iter().enumerate() {
            if state.name().is_empty() {
                return Err(WorkflowError::EmptyStateName(i));
            }
            if !names.insert(state.name()) {
                return Err(WorkflowError::DuplicateState(state.name().to_string()));
            }
        }

        if !names.contains(self.start_at.as_str()) {
            return Err(WorkflowError::UnknownStart(self.start_at.clone()));
        }

        for state in &self.states {
            if let State::Choice(choice) = state {
                if choice.rules.is_empty() {
                    return Err(WorkflowError::EmptyChoice(choice.name.clone()));
                }
            }

            for target in state.successors() {
                if !names.contains(target) {
                    return Err(WorkflowError::UnknownTarget {
                        from: state.name().to_string(),
                        to: target.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate that every task's capability is registered
    pub fn validate_capabilities(&self, registry: &CapabilityRegistry) -> Result<(), WorkflowError> {
        for state in &self.states {
            if let State::Task(task) = state {
                if !registry.contains(&task.capability) {
                    return Err(WorkflowError::UnknownCapability {
                        state: task.name.clone(),
                        capability: task.capability.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
