//! Validation outcomes and the checklist that builds them.

use crate::error::EnvironmentError;

/// The outcome of evaluating a challenge against the current state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationResult {
    pub success: bool,
    pub message: String,
    /// Only ever set on failure.
    pub hint: Option<String>,
}

impl ValidationResult {
    pub fn passed(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            hint: None,
        }
    }

    pub fn failed(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            hint,
        }
    }

    /// Downgrade an environment failure to an ordinary failed result.
    pub fn environment(err: &EnvironmentError) -> Self {
        Self::failed(
            format!("Environment error: {err}"),
            Some(
                "Something went wrong outside the challenge itself. \
                 Try again, or check that git is installed."
                    .to_string(),
            ),
        )
    }
}

#[derive(Clone, Debug)]
struct Criterion {
    label: String,
    satisfied: bool,
    hint: Option<String>,
}

/// Named pass/fail criteria evaluated together.
///
/// Every criterion is recorded, not just the first failure, so the finished
/// result can list everything still missing.
#[derive(Clone, Debug, Default)]
pub struct Checklist {
    criteria: Vec<Criterion>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, label: impl Into<String>, satisfied: bool) -> &mut Self {
        self.check_with_hint(label, satisfied, None)
    }

    pub fn check_with_hint(
        &mut self,
        label: impl Into<String>,
        satisfied: bool,
        hint: Option<String>,
    ) -> &mut Self {
        self.criteria.push(Criterion {
            label: label.into(),
            satisfied,
            hint,
        });
        self
    }

    pub fn total(&self) -> usize {
        self.criteria.len()
    }

    pub fn satisfied(&self) -> usize {
        self.criteria.iter().filter(|c| c.satisfied).count()
    }

    pub fn all_satisfied(&self) -> bool {
        self.criteria.iter().all(|c| c.satisfied)
    }

    pub fn unmet(&self) -> impl Iterator<Item = &str> {
        self.criteria
            .iter()
            .filter(|c| !c.satisfied)
            .map(|c| c.label.as_str())
    }

    /// Turn the checklist into a result. The hint comes from the first unmet
    /// criterion that has one, falling back to `fallback_hint`.
    pub fn finish(&self, success_message: &str, fallback_hint: Option<&str>) -> ValidationResult {
        if self.all_satisfied() {
            return ValidationResult::passed(success_message);
        }
        let mut message = format!(
            "{}/{} checks passed. Still to do:",
            self.satisfied(),
            self.total()
        );
        for label in self.unmet() {
            message.push_str("\n  - ");
            message.push_str(label);
        }
        let hint = self
            .criteria
            .iter()
            .filter(|c| !c.satisfied)
            .find_map(|c| c.hint.clone())
            .or_else(|| fallback_hint.map(str::to_string));
        ValidationResult::failed(message, hint)
    }
}
