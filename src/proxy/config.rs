use serde::{Deserialize, Serialize};
use tokio::time::Duration;
use url::Url;

/// Gateway service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Whether the gateway starts listening at all
    pub enabled: bool,

    /// Whether LAN access is allowed
    /// - false: loopback only, 127.0.0.1 (default, privacy first)
    /// - true: bind 0.0.0.0
    #[serde(default)]
    pub allow_lan_access: bool,

    /// Listen port
    pub port: u16,

    /// Backend API base origin (scheme + host + port, no trailing slash)
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Stamp the Secure attribute on issued cookies (enable in production,
    /// where the gateway is served over HTTPS)
    #[serde(default)]
    pub secure_cookies: bool,

    /// Deadline for ordinary proxied requests (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Deadline for multipart/form-data uploads (seconds)
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,

    /// Deadline for the token-refresh call (seconds); refresh must be fast,
    /// a slow identity provider must not stall the whole request
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allow_lan_access: false,
            port: 8080,
            backend_url: default_backend_url(),
            secure_cookies: false,
            request_timeout_secs: default_request_timeout(),
            upload_timeout_secs: default_upload_timeout(),
            refresh_timeout_secs: default_refresh_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_upload_timeout() -> u64 {
    300 // file uploads are capped by time, not by body size
}

fn default_refresh_timeout() -> u64 {
    10
}

impl GatewayConfig {
    /// Actual bind address
    /// - allow_lan_access = false: "127.0.0.1"
    /// - allow_lan_access = true: "0.0.0.0"
    pub fn get_bind_address(&self) -> &str {
        if self.allow_lan_access {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        }
    }

    /// Validate the backend origin before starting the server
    pub fn validate(&self) -> Result<(), String> {
        let url = Url::parse(&self.backend_url)
            .map_err(|e| format!("Invalid backend_url {:?}: {}", self.backend_url, e))?;
        if url.host_str().is_none() {
            return Err(format!("backend_url {:?} has no host", self.backend_url));
        }
        Ok(())
    }

    pub fn request_deadline(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_deadline(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn refresh_deadline(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::default();
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.get_bind_address(), "127.0.0.1");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.upload_timeout_secs, 300);
        assert_eq!(config.refresh_timeout_secs, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_lan_bind_address() {
        let config = GatewayConfig {
            allow_lan_access: true,
            ..GatewayConfig::default()
        };
        assert_eq!(config.get_bind_address(), "0.0.0.0");
    }

    #[test]
    fn test_validate_rejects_garbage_backend_url() {
        let config = GatewayConfig {
            backend_url: "not a url".to_string(),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"enabled": true, "port": 9000}"#).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.backend_url, "http://localhost:8000");
        assert_eq!(config.refresh_timeout_secs, 10);
        assert!(!config.secure_cookies);
    }
}
