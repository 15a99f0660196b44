use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StrainError {
    #[error("missing file: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("{locator}: {reason}")]
    Malformed { locator: String, reason: String },

    #[error("question '{question}' has no weight for answer '{answer}'")]
    UnknownChoice { question: String, answer: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StrainError {
    pub fn malformed(locator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            locator: locator.into(),
            reason: reason.into(),
        }
    }
}
