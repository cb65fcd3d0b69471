use thiserror::Error;

/// Reasons a report generation is refused before anything is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("no note titled \"{title}\"")]
    MissingNote { title: String },

    #[error("note \"{title}\" has no table rows")]
    MissingTemplateRows { title: String },
}

impl ReportError {
    pub fn missing_note(title: impl Into<String>) -> Self {
        Self::MissingNote {
            title: title.into(),
        }
    }
}
