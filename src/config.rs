use std::path::{Path, PathBuf};

use crate::history::HistoryStore;

pub const QUESTIONS_FILE: &str = "questions.json";
/// Runs fed into the trend after a submission.
pub const TREND_WINDOW: usize = 30;
/// Runs shown by `history` when no limit is given.
pub const LIST_WINDOW: usize = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub base: PathBuf,
    pub questions: PathBuf,
}

impl Settings {
    /// `questions` defaults to `questions.json` inside `base`.
    pub fn resolve(base: PathBuf, questions: Option<PathBuf>) -> Self {
        let questions = questions.unwrap_or_else(|| base.join(QUESTIONS_FILE));
        Self { base, questions }
    }

    pub fn history(&self) -> HistoryStore {
        HistoryStore::in_dir(&self.base)
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}
