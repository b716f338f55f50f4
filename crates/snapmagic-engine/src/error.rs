use std::io;
use std::path::PathBuf;

use snapmagic_contracts::photos::EditFailureKind;
use thiserror::Error;

/// Failure of one photo's edit. Every variant ends as an `Error` status in the
/// registry; the variant survives only for diagnostics.
#[derive(Debug, Error)]
pub enum EditError {
    #[error("edit service not configured: {0}")]
    Configuration(String),
    #[error("failed reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("edit service failed: {0}")]
    Service(String),
    #[error("edit service returned no image: {0}")]
    EmptyResult(String),
}

impl EditError {
    pub fn kind(&self) -> EditFailureKind {
        match self {
            Self::Configuration(_) => EditFailureKind::Configuration,
            Self::Read { .. } => EditFailureKind::Read,
            Self::Service(_) => EditFailureKind::Service,
            Self::EmptyResult(_) => EditFailureKind::EmptyResult,
        }
    }
}

/// The request URL is dropped from the message so endpoint details never reach
/// logs or settlements.
impl From<reqwest::Error> for EditError {
    fn from(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        let mut message = err.without_url().to_string();
        if timed_out {
            message = format!("request timed out: {message}");
        }
        Self::Service(message)
    }
}
