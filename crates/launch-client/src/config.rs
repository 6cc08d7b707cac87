use std::time::Duration;

/// Where and how to reach the queue service.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root, e.g. `https://api.example.com`; `/graphql` is appended.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_url_ignores_trailing_slash() {
        assert_eq!(
            ClientConfig::new("http://svc:8080/").graphql_url(),
            "http://svc:8080/graphql"
        );
        assert_eq!(
            ClientConfig::new("http://svc").graphql_url(),
            "http://svc/graphql"
        );
    }
}
