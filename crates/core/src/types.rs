/// Wall-clock timestamps on the wire are epoch milliseconds (UTC).
pub type EpochMillis = i64;

/// Opaque identifier of one job run.
pub type SessionId = String;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> EpochMillis {
    chrono::Utc::now().timestamp_millis()
}

/// Mint a fresh session id.
///
/// UUID v7 keeps ids roughly time-ordered, which makes log scanning easier.
pub fn new_session_id() -> SessionId {
    uuid::Uuid::now_v7().to_string()
}
