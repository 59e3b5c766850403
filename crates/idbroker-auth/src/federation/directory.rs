//! Delegated directory group lookup.
//!
//! A service account impersonates the configured delegation user through a
//! signed JWT-bearer assertion, then lists the groups a user belongs to.
//!
//! # Flow
//!
//! 1. Parse the service account key JSON
//! 2. Sign an RS256 assertion (`iss` = service account, `sub` = delegation
//!    user, `aud` = key's token URI) and exchange it for an access token
//! 3. Page through the groups endpoint with `userKey=<email>` until no
//!    `nextPageToken` is returned. A page token is never followed twice.

use std::collections::HashSet;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::IdpError;
use super::provider::OAuthErrorResponse;

/// Token URI used when the key does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime of the signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The parts of a service account key the broker uses.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account identity.
    pub client_email: String,

    /// PEM-encoded RSA private key.
    pub private_key: String,

    /// Key identifier, sent as the JWT `kid`.
    #[serde(default)]
    pub private_key_id: Option<String>,

    /// Where assertions are exchanged for access tokens.
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    /// Parses a service account key from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::InvalidServiceAccountKey` if the JSON is malformed
    /// or lacks `client_email`/`private_key`.
    pub fn from_json(json: &str) -> Result<Self, IdpError> {
        let key: Self = serde_json::from_str(json)
            .map_err(|e| IdpError::InvalidServiceAccountKey(e.to_string()))?;
        if key.client_email.trim().is_empty() {
            return Err(IdpError::InvalidServiceAccountKey(
                "client_email is empty".to_string(),
            ));
        }
        if key.private_key.trim().is_empty() {
            return Err(IdpError::InvalidServiceAccountKey(
                "private_key is empty".to_string(),
            ));
        }
        Ok(key)
    }

    /// Returns the token URI, falling back to the provider default.
    #[must_use]
    pub fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }

    /// Signs a JWT-bearer assertion impersonating `subject`.
    ///
    /// # Errors
    ///
    /// Returns `IdpError::InvalidServiceAccountKey` if the private key is not
    /// a PEM RSA key, or `IdpError::JwtError` if signing fails.
    pub fn sign_assertion(
        &self,
        subject: &str,
        scope: &str,
        now: OffsetDateTime,
    ) -> Result<String, IdpError> {
        let encoding_key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| IdpError::InvalidServiceAccountKey(format!("private_key: {e}")))?;

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();

        let iat = now.unix_timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            sub: subject,
            scope,
            aud: self.token_uri(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
    }
}

/// Claims of the JWT-bearer assertion.
#[derive(Debug, Serialize)]
pub struct AssertionClaims<'a> {
    /// Service account email.
    pub iss: &'a str,
    /// Impersonated user.
    pub sub: &'a str,
    /// Requested scope.
    pub scope: &'a str,
    /// Token URI.
    pub aud: &'a str,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupsPage {
    #[serde(default)]
    groups: Vec<DirectoryGroup>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectoryGroup {
    email: String,
}

/// Client for the directory API.
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    http_client: reqwest::Client,
    groups_endpoint: String,
    scope: String,
}

impl DirectoryClient {
    /// Creates a directory client.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        groups_endpoint: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            groups_endpoint: groups_endpoint.into(),
            scope: scope.into(),
        }
    }

    /// Lists the email addresses of every group `email` belongs to.
    ///
    /// # Errors
    ///
    /// Returns a credential error for a bad key, `IdpError::DelegationFailed`
    /// if the assertion is refused, `IdpError::DirectoryQueryFailed` if a
    /// groups page cannot be fetched, and `IdpError::InvalidResponse` if the
    /// directory hands back a page token it already returned.
    pub async fn groups_for(
        &self,
        service_account_key: &str,
        subject: &str,
        email: &str,
    ) -> Result<Vec<String>, IdpError> {
        let key = ServiceAccountKey::from_json(service_account_key)?;
        let access_token = self.delegated_token(&key, subject).await?;

        let mut groups = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .http_client
                .get(&self.groups_endpoint)
                .bearer_auth(&access_token)
                .query(&[("userKey", email)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(IdpError::DirectoryQueryFailed {
                    status: response.status().as_u16(),
                });
            }

            let page: GroupsPage = response.json().await.map_err(|e| {
                IdpError::InvalidResponse(format!("Failed to parse groups page: {e}"))
            })?;
            groups.extend(page.groups.into_iter().map(|g| g.email));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    return Err(IdpError::InvalidResponse(format!(
                        "directory repeated page token {next:?}"
                    )));
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::debug!(email = %email, count = groups.len(), "Fetched directory groups");
        Ok(groups)
    }

    /// Exchanges a signed assertion for a delegated access token.
    async fn delegated_token(
        &self,
        key: &ServiceAccountKey,
        subject: &str,
    ) -> Result<String, IdpError> {
        let assertion = key.sign_assertion(subject, &self.scope, OffsetDateTime::now_utc())?;

        tracing::debug!(
            service_account = %key.client_email,
            subject = %subject,
            "Requesting delegated directory token"
        );

        let response = self
            .http_client
            .post(key.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(IdpError::DelegationFailed(format!(
                    "{}: {}",
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default()
                )));
            }
            return Err(IdpError::DelegationFailed(format!("HTTP {status}")));
        }

        let token: AccessTokenResponse = response.json().await.map_err(|e| {
            IdpError::DelegationFailed(format!("Failed to parse token response: {e}"))
        })?;
        Ok(token.access_token)
    }
}
