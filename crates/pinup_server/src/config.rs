//! Request surface configuration.

use pinup_core::AdmissionConfig;

/// Client key used when a request names none.
pub const DEFAULT_CLIENT: &str = "local";

/// Configuration for the request surface.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Admission control in front of every request.
    pub admission: AdmissionConfig,
    /// Largest accepted request line in bytes.
    pub max_request_bytes: usize,
    /// Client key for requests that carry none.
    pub default_client: String,
}

impl ServerConfig {
    /// Creates a configuration with the given admission settings.
    pub fn new(admission: AdmissionConfig) -> Self {
        Self {
            admission,
            max_request_bytes: 16 * 1024 * 1024,
            default_client: DEFAULT_CLIENT.to_string(),
        }
    }

    /// Sets the admission configuration.
    #[must_use]
    pub fn with_admission(mut self, admission: AdmissionConfig) -> Self {
        self.admission = admission;
        self
    }

    /// Sets the largest accepted request.
    #[must_use]
    pub fn with_max_request_bytes(mut self, bytes: usize) -> Self {
        self.max_request_bytes = bytes;
        self
    }

    /// Sets the default client key.
    #[must_use]
    pub fn with_default_client(mut self, client: impl Into<String>) -> Self {
        self.default_client = client.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(AdmissionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert!(config.admission.enabled);
        assert_eq!(config.admission.max_requests, 100);
        assert_eq!(config.default_client, "local");
    }

    #[test]
    fn builders() {
        let config = ServerConfig::default()
            .with_admission(AdmissionConfig::new(5, Duration::from_secs(1)))
            .with_max_request_bytes(1024)
            .with_default_client("ui");
        assert_eq!(config.admission.max_requests, 5);
        assert_eq!(config.max_request_bytes, 1024);
        assert_eq!(config.default_client, "ui");
    }
}
