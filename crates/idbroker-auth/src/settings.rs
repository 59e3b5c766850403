//! Engine settings.
//!
//! Host-level, static settings for the broker: which provider endpoints to
//! talk to, how the HTTP client is built, and what the audit trail records.
//! These are distinct from the mount configuration an administrator writes at
//! runtime (see [`crate::config`]).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Root settings for the identity broker engine.
///
/// # Example (TOML)
///
/// ```toml
/// [provider]
/// token_endpoint = "https://oauth2.googleapis.com/token"
///
/// [http]
/// request_timeout = "30s"
///
/// [audit]
/// log_failed_auth = true
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// External provider endpoints and scopes.
    pub provider: ProviderEndpoints,

    /// HTTP client settings.
    pub http: HttpSettings,

    /// Audit trail settings.
    pub audit: AuditSettings,
}

/// Endpoints of the external OAuth provider and its directory API.
///
/// Defaults point at Google's OAuth2, userinfo and Admin Directory endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderEndpoints {
    /// Consent page the user is sent to for an authorization code.
    pub authorization_endpoint: String,

    /// Code-for-token exchange endpoint.
    pub token_endpoint: String,

    /// Endpoint returning the authenticated user's email and hosted domain.
    pub userinfo_endpoint: String,

    /// Directory endpoint listing the groups a user belongs to.
    pub directory_groups_endpoint: String,

    /// Scopes requested on the consent page.
    pub scopes: Vec<String>,

    /// Scope requested by the delegated service credential.
    pub directory_scope: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorization_endpoint: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_endpoint: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            directory_groups_endpoint: "https://admin.googleapis.com/admin/directory/v1/groups"
                .to_string(),
            scopes: vec!["https://www.googleapis.com/auth/userinfo.email".to_string()],
            directory_scope: "https://www.googleapis.com/auth/admin.directory.group.readonly"
                .to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Points every endpoint at `base`, keeping the default paths.
    ///
    /// Used by tests to aim the broker at a mock provider.
    #[must_use]
    pub fn with_base_url(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorization_endpoint: format!("{base}/o/oauth2/auth"),
            token_endpoint: format!("{base}/token"),
            userinfo_endpoint: format!("{base}/oauth2/v2/userinfo"),
            directory_groups_endpoint: format!("{base}/admin/directory/v1/groups"),
            ..Self::default()
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Per-request timeout. Unset means the client never times out on its own
    /// and the host bounds call duration.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<Duration>,

    /// User-Agent header sent to the provider.
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: None,
            user_agent: concat!("idbroker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Audit logging settings.
///
/// Controls which broker events reach the `idbroker::audit` tracing target.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Log successful logins and renewals.
    pub log_successful_auth: bool,

    /// Log denied or failed logins and renewals.
    pub log_failed_auth: bool,

    /// Log configuration and role changes.
    pub log_admin_changes: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_successful_auth: true,
            log_failed_auth: true,
            log_admin_changes: true,
        }
    }
}

/// Settings validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    /// An invalid settings value was provided.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),

    /// The settings document could not be parsed.
    #[error("Failed to parse settings: {0}")]
    Parse(String),
}

impl BrokerSettings {
    /// Parses and validates settings from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Parse` for malformed TOML and
    /// `SettingsError::InvalidValue` if validation fails.
    pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
        let settings: Self =
            toml::from_str(source).map_err(|e| SettingsError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` if:
    /// - An endpoint is not an absolute http(s) URL
    /// - No consent scopes are configured
    /// - The directory scope is empty
    /// - The request timeout is zero
    pub fn validate(&self) -> Result<(), SettingsError> {
        let endpoints = [
            ("authorization_endpoint", &self.provider.authorization_endpoint),
            ("token_endpoint", &self.provider.token_endpoint),
            ("userinfo_endpoint", &self.provider.userinfo_endpoint),
            (
                "directory_groups_endpoint",
                &self.provider.directory_groups_endpoint,
            ),
        ];
        for (name, value) in endpoints {
            let valid = Url::parse(value)
                .map(|u| matches!(u.scheme(), "http" | "https"))
                .unwrap_or(false);
            if !valid {
                return Err(SettingsError::InvalidValue(format!(
                    "{name} must be an http(s) URL; got '{value}'"
                )));
            }
        }

        if self.provider.scopes.iter().all(|s| s.trim().is_empty()) {
            return Err(SettingsError::InvalidValue(
                "at least one provider scope is required".to_string(),
            ));
        }

        if self.provider.directory_scope.trim().is_empty() {
            return Err(SettingsError::InvalidValue(
                "directory_scope cannot be empty".to_string(),
            ));
        }

        if self.http.request_timeout == Some(Duration::ZERO) {
            return Err(SettingsError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the HTTP client used for every provider call.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidValue` if the client cannot be constructed.
    pub fn http_client(&self) -> Result<reqwest::Client, SettingsError> {
        let mut builder = reqwest::Client::builder().user_agent(self.http.user_agent.clone());
        if let Some(timeout) = self.http.request_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|e| SettingsError::InvalidValue(format!("http client: {e}")))
    }
}
