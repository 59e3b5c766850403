//! OAuth provider client.
//!
//! [`OAuthIdentityResolver`] talks to the provider's token and userinfo
//! endpoints and, when group fetching is enabled, to the directory through a
//! [`DirectoryClient`].
//!
//! # Example
//!
//! ```ignore
//! use idbroker_auth::federation::OAuthIdentityResolver;
//! use idbroker_auth::settings::BrokerSettings;
//!
//! let settings = BrokerSettings::default();
//! let resolver = OAuthIdentityResolver::new(settings.http_client()?, settings.provider.clone());
//! let url = resolver.authorization_url(&config)?;
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use super::directory::DirectoryClient;
use super::resolver::{IdentityResolver, ProviderIdentity};
use super::IdpError;
use crate::config::{GroupDelegation, ProviderConfig};
use crate::settings::ProviderEndpoints;
use crate::token::ProviderToken;

/// `state` value sent on the consent page.
pub const AUTHORIZATION_STATE: &str = "state";

/// Identity resolver backed by the OAuth provider's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct OAuthIdentityResolver {
    http_client: reqwest::Client,
    endpoints: ProviderEndpoints,
    directory: DirectoryClient,
}

impl OAuthIdentityResolver {
    /// Creates a resolver using `http_client` for every provider call.
    #[must_use]
    pub fn new(http_client: reqwest::Client, endpoints: ProviderEndpoints) -> Self {
        let directory = DirectoryClient::new(
            http_client.clone(),
            endpoints.directory_groups_endpoint.clone(),
            endpoints.directory_scope.clone(),
        );
        Self {
            http_client,
            endpoints,
            directory,
        }
    }

    /// Returns the configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }

    /// Builds the consent page URL for `config`.
    ///
    /// Requests offline access and forces the approval prompt so the
    /// provider issues a refresh token on every consent.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::UrlError` if the authorization endpoint is invalid.
    pub fn authorization_url(&self, config: &ProviderConfig) -> Result<Url, IdpError> {
        authorization_url(&self.endpoints, config)
    }
}

/// Builds the consent page URL for `config` against `endpoints`.
///
/// # Errors
///
/// Returns `IdpError::UrlError` if the authorization endpoint is invalid.
pub fn authorization_url(
    endpoints: &ProviderEndpoints,
    config: &ProviderConfig,
) -> Result<Url, IdpError> {
    let mut url = Url::parse(&endpoints.authorization_endpoint)?;
    url.query_pairs_mut()
        .append_pair("access_type", "offline")
        .append_pair("client_id", &config.client_id)
        .append_pair("prompt", "consent")
        .append_pair("redirect_uri", &config.redirect_url)
        .append_pair("response_type", "code")
        .append_pair("scope", &endpoints.scopes.join(" "))
        .append_pair("state", AUTHORIZATION_STATE);
    Ok(url)
}

#[async_trait]
impl IdentityResolver for OAuthIdentityResolver {
    async fn exchange(
        &self,
        config: &ProviderConfig,
        code: &str,
    ) -> Result<ProviderToken, IdpError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_url.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        tracing::debug!(
            "Exchanging authorization code with token endpoint: {}",
            self.endpoints.token_endpoint
        );

        let response = self
            .http_client
            .post(&self.endpoints.token_endpoint)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(IdpError::oauth_error(
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default(),
                ));
            }

            return Err(IdpError::TokenExchangeFailed(format!("HTTP {status}")));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            IdpError::TokenExchangeFailed(format!("Failed to parse token response: {e}"))
        })?;

        token_response.into_token(OffsetDateTime::now_utc())
    }

    async fn lookup_identity(&self, token: &ProviderToken) -> Result<ProviderIdentity, IdpError> {
        let response = self
            .http_client
            .get(&self.endpoints.userinfo_endpoint)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdpError::UserInfoFailed {
                status: response.status().as_u16(),
            });
        }

        let userinfo: UserInfoResponse = response.json().await.map_err(|e| {
            IdpError::InvalidResponse(format!("Failed to parse userinfo response: {e}"))
        })?;

        let email = userinfo
            .email
            .filter(|e| !e.is_empty())
            .ok_or(IdpError::MissingEmail)?;

        Ok(ProviderIdentity {
            email,
            domain: userinfo.hd.unwrap_or_default(),
        })
    }

    async fn lookup_groups(
        &self,
        delegation: GroupDelegation<'_>,
        email: &str,
    ) -> Result<Vec<String>, IdpError> {
        self.directory
            .groups_for(delegation.service_account_key, delegation.subject, email)
            .await
    }
}

/// OAuth token response from the provider.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// The token type (usually "Bearer").
    #[serde(default)]
    pub token_type: Option<String>,

    /// Token expiration in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,

    /// Optional refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Converts the response into a stored token, turning `expires_in` into
    /// an absolute expiry relative to `now`.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::InvalidResponse` if the expiry falls outside the
    /// representable calendar.
    pub fn into_token(self, now: OffsetDateTime) -> Result<ProviderToken, IdpError> {
        let mut token = ProviderToken::bearer(self.access_token);
        if let Some(token_type) = self.token_type.filter(|t| !t.is_empty()) {
            token.token_type = token_type;
        }
        token.refresh_token = self.refresh_token;
        token.expiry = self
            .expires_in
            .filter(|secs| *secs > 0)
            .map(|secs| {
                now.checked_add(time::Duration::seconds(secs)).ok_or_else(|| {
                    IdpError::InvalidResponse(format!("expires_in out of range: {secs}"))
                })
            })
            .transpose()?;
        Ok(token)
    }
}

#[derive(Debug, Deserialize)]
struct UserInfoResponse {
    email: Option<String>,
    hd: Option<String>,
}

/// OAuth error response body.
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub(crate) error: String,
    pub(crate) error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> ProviderConfig {
        ProviderConfig {
            client_id: "cid".to_string(),
            client_secret: "csecret".to_string(),
            redirect_url: "https://vault.example.com/cb".to_string(),
            fetch_groups: false,
            service_account_key: None,
            delegation_user: None,
        }
    }

    fn resolver(server: &MockServer) -> OAuthIdentityResolver {
        OAuthIdentityResolver::new(
            reqwest::Client::new(),
            ProviderEndpoints::with_base_url(&server.uri()),
        )
    }

    #[test]
    fn test_authorization_url() {
        let url = authorization_url(&ProviderEndpoints::default(), &config()).unwrap();
        assert_eq!(url.host_str(), Some("accounts.google.com"));

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["client_id"], "cid");
        assert_eq!(pairs["redirect_uri"], "https://vault.example.com/cb");
        assert_eq!(pairs["access_type"], "offline");
        assert_eq!(pairs["prompt"], "consent");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["state"], "state");
        assert!(pairs["scope"].ends_with("userinfo.email"));
        assert!(!url.as_str().contains("csecret"));
    }

    #[test]
    fn test_token_response_expiry() {
        let now = datetime!(2026-10-19 12:00 UTC);
        let token = TokenResponse {
            access_token: "at".to_string(),
            token_type: None,
            expires_in: Some(3599),
            refresh_token: Some("rt".to_string()),
        }
        .into_token(now)
        .unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expiry, Some(datetime!(2026-10-19 12:59:59 UTC)));
    }

    #[test]
    fn test_token_response_expiry_out_of_range() {
        let err = TokenResponse {
            access_token: "at".to_string(),
            token_type: None,
            expires_in: Some(i64::MAX),
            refresh_token: None,
        }
        .into_token(datetime!(2026-10-19 12:00 UTC))
        .unwrap_err();
        assert!(matches!(err, IdpError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_exchange_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=4%2FP7q7W91"))
            .and(body_string_contains("client_secret=csecret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.token",
                "token_type": "Bearer",
                "expires_in": 3599,
                "refresh_token": "1//refresh",
                "id_token": "ignored"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let token = resolver(&server)
            .exchange(&config(), "4/P7q7W91")
            .await
            .unwrap();
        assert_eq!(token.access_token, "ya29.token");
        assert_eq!(token.refresh_token.as_deref(), Some("1//refresh"));
        assert!(token.expiry.is_some());
    }

    #[tokio::test]
    async fn test_exchange_rejected_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Bad Request"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = resolver(&server)
            .exchange(&config(), "used-code")
            .await
            .unwrap_err();
        assert!(matches!(err, IdpError::OAuthError { ref error, .. } if error == "invalid_grant"));
    }

    #[tokio::test]
    async fn test_exchange_non_oauth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = resolver(&server)
            .exchange(&config(), "code")
            .await
            .unwrap_err();
        assert!(matches!(err, IdpError::TokenExchangeFailed(ref m) if m.contains("502")));
    }

    #[tokio::test]
    async fn test_lookup_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v2/userinfo"))
            .and(header("authorization", "Bearer ya29.token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "1234",
                "email": "alice@example.com",
                "verified_email": true,
                "hd": "example.com"
            })))
            .mount(&server)
            .await;

        let identity = resolver(&server)
            .lookup_identity(&ProviderToken::bearer("ya29.token"))
            .await
            .unwrap();
        assert_eq!(identity.email, "alice@example.com");
        assert_eq!(identity.domain, "example.com");
    }

    #[tokio::test]
    async fn test_lookup_identity_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v2/userinfo"))
            .and(header("authorization", "Bearer expired"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oauth2/v2/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "1"})))
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        let err = resolver
            .lookup_identity(&ProviderToken::bearer("expired"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdpError::UserInfoFailed { status: 401 }));

        let err = resolver
            .lookup_identity(&ProviderToken::bearer("no-email"))
            .await
            .unwrap_err();
        assert!(matches!(err, IdpError::MissingEmail));
    }
}
