//! Environment-provided configuration
//!
//! Values are read once into optional fields. A missing value is reported as
//! a configuration error when a request needs it, never at startup.

use crate::error::TurnError;

/// Default base URL of the AI gateway that fronts the chat models
pub const DEFAULT_GATEWAY_URL: &str = "https://gateway.ai.cloudflare.com/v1";

/// Default base URL of the account API that runs image models
pub const DEFAULT_ACCOUNT_API_URL: &str = "https://api.cloudflare.com/client/v4/accounts";

/// Overall deadline for a single HTTP request, streaming included
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Credentials and endpoints for the inference services
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub account_id: Option<String>,
    pub gateway_id: Option<String>,
    /// Bearer token for the chat gateway
    pub gateway_token: Option<String>,
    /// Bearer token for the image endpoint
    pub auth_token: Option<String>,
    /// Override for [`DEFAULT_GATEWAY_URL`]
    pub gateway_url: Option<String>,
    /// Override for [`DEFAULT_ACCOUNT_API_URL`]
    pub account_api_url: Option<String>,
}

/// Everything needed to open a chat stream
#[derive(Debug, Clone)]
pub struct ChatCredentials {
    pub account_id: String,
    pub gateway_id: String,
    pub token: String,
    pub base_url: String,
}

/// Everything needed to call an image model
#[derive(Debug, Clone)]
pub struct ImageCredentials {
    pub account_id: String,
    pub token: String,
    pub base_url: String,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            account_id: non_empty_var("CLOUDFLARE_ACCOUNT_ID"),
            gateway_id: non_empty_var("CLOUDFLARE_AI_GATEWAY"),
            gateway_token: non_empty_var("CLOUDFLARE_AI_GATEWAY_TOKEN"),
            auth_token: non_empty_var("CLOUDFLARE_AUTH_TOKEN"),
            gateway_url: non_empty_var("FLARECHAT_GATEWAY_URL"),
            account_api_url: non_empty_var("FLARECHAT_ACCOUNT_API_URL"),
        }
    }

    /// Credentials for the streaming chat endpoint.
    ///
    /// # Errors
    /// Returns a configuration error if the account, gateway or token is missing.
    pub fn chat_credentials(&self) -> Result<ChatCredentials, TurnError> {
        match (&self.account_id, &self.gateway_id, &self.gateway_token) {
            (Some(account_id), Some(gateway_id), Some(token)) => Ok(ChatCredentials {
                account_id: account_id.clone(),
                gateway_id: gateway_id.clone(),
                token: token.clone(),
                base_url: self
                    .gateway_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
            }),
            _ => Err(TurnError::configuration("Cloudflare credentials are not set.")
                .with_banner("API credentials not configured.")),
        }
    }

    /// Credentials for the image endpoint.
    ///
    /// # Errors
    /// Returns a configuration error if the account or auth token is missing.
    pub fn image_credentials(&self) -> Result<ImageCredentials, TurnError> {
        match (&self.account_id, &self.auth_token) {
            (Some(account_id), Some(token)) => Ok(ImageCredentials {
                account_id: account_id.clone(),
                token: token.clone(),
                base_url: self
                    .account_api_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_ACCOUNT_API_URL.to_string()),
            }),
            _ => Err(TurnError::configuration(
                "API credentials not configured for image generation.",
            )
            .with_banner("API credentials not configured.")),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TurnErrorKind;

    fn full_config() -> GatewayConfig {
        GatewayConfig {
            account_id: Some("acct".to_string()),
            gateway_id: Some("gw".to_string()),
            gateway_token: Some("chat-token".to_string()),
            auth_token: Some("image-token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_chat_credentials_complete() {
        let creds = full_config().chat_credentials().unwrap();
        assert_eq!(creds.account_id, "acct");
        assert_eq!(creds.gateway_id, "gw");
        assert_eq!(creds.token, "chat-token");
        assert_eq!(creds.base_url, DEFAULT_GATEWAY_URL);
    }

    #[test]
    fn test_missing_gateway_is_configuration_error() {
        let config = GatewayConfig {
            gateway_id: None,
            ..full_config()
        };
        let err = config.chat_credentials().unwrap_err();
        assert_eq!(err.kind, TurnErrorKind::Configuration);
        assert_eq!(err.user_content(), "Cloudflare credentials are not set.");
        assert_eq!(err.banner_text(), "API credentials not configured.");
    }

    #[test]
    fn test_image_credentials_need_auth_token() {
        let config = GatewayConfig {
            auth_token: None,
            ..full_config()
        };
        let err = config.image_credentials().unwrap_err();
        assert_eq!(err.kind, TurnErrorKind::Configuration);
        assert_eq!(
            err.reason(),
            "API credentials not configured for image generation."
        );
    }

    #[test]
    fn test_base_url_override() {
        let config = GatewayConfig {
            account_api_url: Some("http://localhost:9000".to_string()),
            ..full_config()
        };
        assert_eq!(
            config.image_credentials().unwrap().base_url,
            "http://localhost:9000"
        );
    }
}
