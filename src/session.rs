use crate::error::StrainError;
use crate::models::{AnswerSet, Catalog, Question};

/// Progress through one sitting of the questionnaire. Owned by the caller and
/// handed back on every step; the scoring core keeps no state between calls.
#[derive(Debug, Clone, Default)]
pub struct Session {
    position: usize,
    answers: AnswerSet,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current<'a>(&self, catalog: &'a Catalog) -> Option<&'a Question> {
        catalog.items.get(self.position)
    }

    /// 1-based number of the current question.
    pub fn number(&self) -> usize {
        self.position + 1
    }

    pub fn is_complete(&self, catalog: &Catalog) -> bool {
        self.position >= catalog.items.len()
    }

    /// Records `choice` (a label of the current question) and advances.
    pub fn answer(&mut self, catalog: &Catalog, choice: &str) -> Result<(), StrainError> {
        let Some(question) = self.current(catalog) else {
            return Ok(());
        };
        if !question.choices.iter().any(|c| c == choice) {
            return Err(StrainError::UnknownChoice {
                question: question.id.clone(),
                answer: choice.to_string(),
            });
        }
        self.answers.insert(question.id.clone(), choice.to_string());
        self.position += 1;
        Ok(())
    }

    /// Leaves the current question unanswered and advances.
    pub fn skip(&mut self, catalog: &Catalog) {
        if !self.is_complete(catalog) {
            self.position += 1;
        }
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn into_answers(self) -> AnswerSet {
        self.answers
    }
}
