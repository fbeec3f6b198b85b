/// Errors surfaced by job lifecycle operations.
///
/// Task and round failures never appear here; they ride in event payloads
/// and session state.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The operation needs the current session to have finished.
    #[error("Session {session_id} is still running")]
    SessionRunning { session_id: String },

    /// The operation needs a running session and there is none.
    #[error("No session is running")]
    NoActiveSession,
}
