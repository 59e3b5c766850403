//! Error types for external identity provider operations.
//!
//! This module provides error types for the provider round trips: code
//! exchange, identity lookup, service credential delegation and directory
//! queries.

/// Errors that can occur while talking to the identity provider or directory.
#[derive(Debug, thiserror::Error)]
pub enum IdpError {
    /// Token exchange with the provider failed.
    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    /// The provider returned an OAuth error.
    #[error("OAuth error from provider: {error} - {description}")]
    OAuthError {
        /// The OAuth error code.
        error: String,
        /// Optional error description.
        description: String,
    },

    /// The identity endpoint rejected the request.
    #[error("Userinfo request failed: HTTP {status}")]
    UserInfoFailed {
        /// HTTP status returned by the provider.
        status: u16,
    },

    /// The identity endpoint answered without an email address.
    #[error("Provider did not return an email address")]
    MissingEmail,

    /// The delegated service credential could not be parsed or used.
    #[error("Invalid service account key: {0}")]
    InvalidServiceAccountKey(String),

    /// Obtaining a delegated access token failed.
    #[error("Delegation failed: {0}")]
    DelegationFailed(String),

    /// The directory group query failed.
    #[error("Directory query failed: HTTP {status}")]
    DirectoryQueryFailed {
        /// HTTP status returned by the directory.
        status: u16,
    },

    /// A provider response body could not be parsed.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// A network error occurred.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Failed to parse a URL.
    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    /// JWT signing error.
    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl IdpError {
    /// Creates an `OAuthError` from a provider response.
    #[must_use]
    pub fn oauth_error(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuthError {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Returns `true` if this is a network or external service error.
    #[must_use]
    pub fn is_external_error(&self) -> bool {
        matches!(
            self,
            Self::TokenExchangeFailed(_)
                | Self::OAuthError { .. }
                | Self::UserInfoFailed { .. }
                | Self::DelegationFailed(_)
                | Self::DirectoryQueryFailed { .. }
                | Self::NetworkError(_)
        )
    }

    /// Returns `true` if the failure is likely transient (network trouble,
    /// throttling or a provider-side 5xx).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(_) => true,
            Self::UserInfoFailed { status } | Self::DirectoryQueryFailed { status } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// Returns `true` if the delegated credential material itself is at fault.
    #[must_use]
    pub fn is_credential_error(&self) -> bool {
        matches!(self, Self::InvalidServiceAccountKey(_) | Self::JwtError(_))
    }
}
