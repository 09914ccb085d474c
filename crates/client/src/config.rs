use url::Url;

use crate::api::ClientError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3030";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: Url,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|e| ClientError::Url(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Url(format!("{base_url} cannot be a base url")));
        }
        Ok(Self { base_url })
    }

    /// Reads `API_BASE_URL`, defaulting to the local server.
    pub fn from_env() -> Result<Self, ClientError> {
        let base = std::env::var("API_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        Self::new(base.as_deref().unwrap_or(DEFAULT_BASE_URL))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_local_server() {
        let config = ClientConfig::new(DEFAULT_BASE_URL).unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:3030/");
    }

    #[test]
    fn rejects_non_base_urls() {
        assert!(matches!(
            ClientConfig::new("mailto:someone@example.com"),
            Err(ClientError::Url(_))
        ));
        assert!(ClientConfig::new("not a url").is_err());
    }
}
