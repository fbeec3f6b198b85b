/// Observer configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// HTTP base URL of the job server, without a trailing slash.
    pub backend_url: String,
}

impl ObserverConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var       | Default                 |
    /// |---------------|-------------------------|
    /// | `BACKEND_URL` | `http://localhost:3000` |
    pub fn from_env() -> Self {
        let backend_url =
            std::env::var("BACKEND_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        Self::new(backend_url)
    }

    pub fn new(backend_url: impl Into<String>) -> Self {
        let backend_url: String = backend_url.into();
        Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
        }
    }

    /// URL of the event channel, e.g. `ws://localhost:3000/api/v1/ws`.
    pub fn ws_url(&self) -> String {
        let base = if let Some(rest) = self.backend_url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = self.backend_url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            self.backend_url.clone()
        };
        format!("{base}/api/v1/ws")
    }

    /// Base URL of the versioned REST API.
    pub fn api_url(&self) -> String {
        format!("{}/api/v1", self.backend_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_swaps_scheme() {
        assert_eq!(
            ObserverConfig::new("http://localhost:3000/").ws_url(),
            "ws://localhost:3000/api/v1/ws"
        );
        assert_eq!(
            ObserverConfig::new("https://jobs.example.com").ws_url(),
            "wss://jobs.example.com/api/v1/ws"
        );
    }

    #[test]
    fn api_url_is_versioned() {
        assert_eq!(
            ObserverConfig::new("http://127.0.0.1:8080").api_url(),
            "http://127.0.0.1:8080/api/v1"
        );
    }
}
