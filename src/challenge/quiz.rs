//! Multiple-choice questions. Validation reads no external state.

use super::ValidationResult;

/// The submitted index is not one of the options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("there is no option {shown}; choose between 1 and {options}", shown = .index + 1)]
pub struct InvalidAnswer {
    pub index: usize,
    pub options: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuizChallenge {
    question: String,
    options: Vec<String>,
    correct_index: usize,
    hint: Option<String>,
    submitted: Option<usize>,
}

impl QuizChallenge {
    pub fn new(question: impl Into<String>, options: Vec<String>, correct_index: usize) -> Self {
        Self {
            question: question.into(),
            options,
            correct_index,
            hint: None,
            submitted: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn submitted(&self) -> Option<usize> {
        self.submitted
    }

    /// Record the player's latest choice (0-based). Later calls overwrite it.
    pub fn submit_answer(&mut self, index: usize) -> Result<(), InvalidAnswer> {
        if index >= self.options.len() {
            return Err(InvalidAnswer {
                index,
                options: self.options.len(),
            });
        }
        self.submitted = Some(index);
        Ok(())
    }

    pub fn validate(&self) -> ValidationResult {
        match self.submitted {
            None => ValidationResult::failed(
                "No answer submitted yet. Use `answer <number>`.",
                self.hint.clone(),
            ),
            Some(index) if index == self.correct_index => {
                ValidationResult::passed(format!("Correct! \"{}\" is right.", self.options[index]))
            }
            Some(index) => ValidationResult::failed(
                format!("Wrong answer: \"{}\" is not it.", self.options[index]),
                self.hint.clone(),
            ),
        }
    }
}
