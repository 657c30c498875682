use crate::challenge::ValidationResult;

/// What kind of command produced a result; the front end styles on this.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultType {
    Help,
    Status,
    Look,
    Movement,
    Command,
    Answer,
    Hint,
    Exit,
    Unknown,
    SessionEnded,
}

/// The single value the engine returns for every processed line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandResult {
    pub kind: ResultType,
    pub success: bool,
    pub message: String,
    pub hint: Option<String>,
}

impl CommandResult {
    pub fn ok(kind: ResultType, message: impl Into<String>) -> Self {
        Self {
            kind,
            success: true,
            message: message.into(),
            hint: None,
        }
    }

    pub fn fail(kind: ResultType, message: impl Into<String>) -> Self {
        Self {
            kind,
            success: false,
            message: message.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: Option<String>) -> Self {
        self.hint = hint;
        self
    }

    pub fn from_validation(kind: ResultType, validation: &ValidationResult) -> Self {
        Self {
            kind,
            success: validation.success,
            message: validation.message.clone(),
            hint: validation.hint.clone(),
        }
    }
}
