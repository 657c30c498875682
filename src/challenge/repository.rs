//! Repository challenges: a rule list, bespoke callbacks, or both.
//!
//! The common case is declarative. Setup steps prepare the sandbox and the
//! rule list is an implicit AND. Rooms that need a multi-step scenario can
//! also carry a setup callback and a validate callback. The validate callback
//! writes its criteria into the same [`Checklist`] the rules use, so every
//! unmet criterion is reported together.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use super::{guarded, ChallengeContext, Checklist, RuleSpec, ValidationResult};
use crate::error::EnvironmentError;

pub type SetupFn = Arc<dyn Fn(&ChallengeContext<'_>) -> Result<(), EnvironmentError> + Send + Sync>;
pub type ValidateFn =
    Arc<
        dyn Fn(&ChallengeContext<'_>, &mut Checklist) -> Result<(), EnvironmentError>
            + Send
            + Sync,
    >;

const DEFAULT_SUCCESS: &str = "Every check passes. The way forward is open.";

/// One declarative setup action.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SetupStep {
    /// Run a command in the primary sandbox. `{aux:<name>}` expands to an
    /// auxiliary sandbox path.
    Run { command: String },
    WriteFile { path: String, contents: String },
}

#[derive(Clone, Default)]
pub struct RepositoryChallenge {
    rules: Vec<RuleSpec>,
    setup_steps: Vec<SetupStep>,
    custom_setup: Option<SetupFn>,
    custom_validate: Option<ValidateFn>,
    hint: Option<String>,
    success_message: Option<String>,
}

impl RepositoryChallenge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl Into<RuleSpec>) -> Self {
        self.rules.push(rule.into());
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = RuleSpec>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn with_setup_step(mut self, step: SetupStep) -> Self {
        self.setup_steps.push(step);
        self
    }

    pub fn with_setup_steps(mut self, steps: impl IntoIterator<Item = SetupStep>) -> Self {
        self.setup_steps.extend(steps);
        self
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&ChallengeContext<'_>) -> Result<(), EnvironmentError> + Send + Sync + 'static,
    {
        self.custom_setup = Some(Arc::new(setup));
        self
    }

    pub fn with_validator<F>(mut self, validate: F) -> Self
    where
        F: Fn(&ChallengeContext<'_>, &mut Checklist) -> Result<(), EnvironmentError>
            + Send
            + Sync
            + 'static,
    {
        self.custom_validate = Some(Arc::new(validate));
        self
    }

    pub(crate) fn with_callbacks(
        mut self,
        setup: Option<SetupFn>,
        validate: Option<ValidateFn>,
    ) -> Self {
        if setup.is_some() {
            self.custom_setup = setup;
        }
        if validate.is_some() {
            self.custom_validate = validate;
        }
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_success_message(mut self, message: impl Into<String>) -> Self {
        self.success_message = Some(message.into());
        self
    }

    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    pub fn setup_steps(&self) -> &[SetupStep] {
        &self.setup_steps
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// True if there is anything to validate at all.
    pub fn has_criteria(&self) -> bool {
        !self.rules.is_empty() || self.custom_validate.is_some()
    }

    pub(crate) fn setup(&self, ctx: &ChallengeContext<'_>) -> Result<(), EnvironmentError> {
        for step in &self.setup_steps {
            match step {
                SetupStep::Run { command } => {
                    debug!(command = %command, "setup step");
                    ctx.run(command)?;
                }
                SetupStep::WriteFile { path, contents } => ctx.write_file(path, contents)?,
            }
        }
        if let Some(setup) = &self.custom_setup {
            guarded(|| setup(ctx))?;
        }
        Ok(())
    }

    pub(crate) fn validate(
        &self,
        ctx: &ChallengeContext<'_>,
    ) -> Result<ValidationResult, EnvironmentError> {
        let mut checklist = Checklist::new();
        for entry in &self.rules {
            let satisfied = entry.rule.evaluate(ctx)?;
            checklist.check_with_hint(entry.rule.label(), satisfied, entry.hint.clone());
        }
        if let Some(validate) = &self.custom_validate {
            guarded(|| validate(ctx, &mut checklist))?;
        }
        Ok(checklist.finish(
            self.success_message.as_deref().unwrap_or(DEFAULT_SUCCESS),
            self.hint.as_deref(),
        ))
    }
}

impl fmt::Debug for RepositoryChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryChallenge")
            .field("rules", &self.rules)
            .field("setup_steps", &self.setup_steps)
            .field("custom_setup", &self.custom_setup.is_some())
            .field("custom_validate", &self.custom_validate.is_some())
            .field("hint", &self.hint)
            .finish_non_exhaustive()
    }
}
