use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the reporting pipeline.
///
/// A wrapped command exiting non-zero is not represented here; that is
/// ordinary input selecting the failure message variant.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The shell could not be spawned or waited on.
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading the file (or stdin) whose content is posted failed.
    #[error("failed to read '{}': {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The webhook could not be reached or answered with an error status.
    #[error("webhook delivery failed: {source}")]
    Delivery {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no webhook URL: set $SLACK_WEBHOOK_URL, pass -w, or add webhook_url to the config file")]
    MissingWebhook,
}

pub type Result<T, E = ReportError> = std::result::Result<T, E>;
