//! Effective configuration for the bridge.
//!
//! The host resolves settings, regional defaults, and workspace overrides
//! before this crate is constructed; `BridgeConfig` is the read-only result
//! of that resolution. There is no hot-reload: a host that changes settings
//! rebuilds the bridge.

use serde::Deserialize;

/// Read-only configuration shared by the authentication service, the model
/// catalog, and the chat endpoints.
///
/// Deserializes from the host's settings JSON:
///
/// ```json
/// {
///   "authBaseUrl": "https://idp.example/auth",
///   "apiBaseUrl": "https://api.example/v1",
///   "clientId": "vc",
///   "scopes": ["openid", "profile", "email"],
///   "redirectUriScheme": "x-host",
///   "extensionId": "pub.ext"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeConfig {
    /// Base URL of the identity provider, without a trailing slash.
    pub auth_base_url: String,
    /// Base URL of the model gateway, without a trailing slash.
    pub api_base_url: String,
    /// OAuth2 public client identifier. No client secret exists; the token
    /// exchange is protected by PKCE alone.
    pub client_id: String,
    /// Scopes requested during authorization, joined with spaces on the wire.
    pub scopes: Vec<String>,
    /// Custom URI scheme registered with the host for redirect dispatch.
    pub redirect_uri_scheme: String,
    /// `<publisher>.<name>` identifier that forms the redirect URI authority.
    pub extension_id: String,
}

impl BridgeConfig {
    pub fn new(
        auth_base_url: impl Into<String>,
        api_base_url: impl Into<String>,
        client_id: impl Into<String>,
    ) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
            api_base_url: api_base_url.into(),
            client_id: client_id.into(),
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            redirect_uri_scheme: "vscode".to_string(),
            extension_id: "feima.feima-bridge".to_string(),
        }
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_redirect(
        mut self,
        scheme: impl Into<String>,
        extension_id: impl Into<String>,
    ) -> Self {
        self.redirect_uri_scheme = scheme.into();
        self.extension_id = extension_id.into();
        self
    }

    /// Exact redirect URI passed to the IdP and later matched by the host's
    /// URI dispatcher: `<scheme>://<extension-id>/oauth/callback`.
    pub fn redirect_uri(&self) -> String {
        format!(
            "{}://{}/oauth/callback",
            self.redirect_uri_scheme, self.extension_id
        )
    }

    pub fn authorize_url(&self) -> String {
        format!("{}/oauth/authorize", self.auth_base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.auth_base_url)
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.api_base_url)
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url)
    }

    /// Scope list in the space-joined form the authorize endpoint expects.
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_uri_combines_scheme_and_extension_id() {
        let config = BridgeConfig::new("https://idp.example/auth", "https://api.example/v1", "vc")
            .with_redirect("x-host", "pub.ext");
        assert_eq!(config.redirect_uri(), "x-host://pub.ext/oauth/callback");
    }

    #[test]
    fn endpoint_urls_extend_base_urls() {
        let config = BridgeConfig::new("https://idp.example/auth", "https://api.example/v1", "vc");
        assert_eq!(
            config.authorize_url(),
            "https://idp.example/auth/oauth/authorize"
        );
        assert_eq!(config.token_url(), "https://idp.example/auth/oauth/token");
        assert_eq!(config.models_url(), "https://api.example/v1/models");
        assert_eq!(
            config.completions_url(),
            "https://api.example/v1/chat/completions"
        );
    }

    #[test]
    fn deserializes_from_host_settings_shape() {
        let config: BridgeConfig = serde_json::from_str(
            r#"{
              "authBaseUrl": "https://idp.example/auth",
              "apiBaseUrl": "https://api.example/v1",
              "clientId": "vc",
              "scopes": ["openid", "email"],
              "redirectUriScheme": "x-host",
              "extensionId": "pub.ext"
            }"#,
        )
        .unwrap();
        assert_eq!(config.client_id, "vc");
        assert_eq!(config.scope_param(), "openid email");
    }
}
