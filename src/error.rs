use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the liveness prober
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("Probe request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Probe timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that abort a sub-store sync cycle
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sub-store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {resource}")]
    UnexpectedStatus { resource: &'static str, status: u16 },

    #[error("Invalid payload from {resource}: {reason}")]
    InvalidPayload {
        resource: &'static str,
        reason: String,
    },

    #[error("Existence check for {resource} failed after {attempts} attempts: {last}")]
    CheckExhausted {
        resource: &'static str,
        attempts: u32,
        last: Box<SyncError>,
    },

    #[error("Mihomo overwrite URL is not configured")]
    MissingOverwriteUrl,
}

impl SyncError {
    /// Whether this error came from the transport layer rather than the sidecar's answer
    pub fn is_transport(&self) -> bool {
        match self {
            SyncError::Transport(_) => true,
            SyncError::CheckExhausted { last, .. } => last.is_transport(),
            _ => false,
        }
    }
}
