/// Errors raised by the observer's transport layer.
///
/// None of these reach the reconciled state: a failed connect is retried
/// with backoff and a failed snapshot pull waits for the next reconnect.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// Failed to establish the WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The job server returned a non-2xx status code.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A frame or response body did not match the protocol.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
}
