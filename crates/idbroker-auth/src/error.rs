//! Broker error types.
//!
//! This module defines all error types that can occur while administering the
//! broker, resolving identities, authorizing them against roles and issuing or
//! renewing leases.

use std::fmt;

use idbroker_storage::StorageError;

use crate::federation::IdpError;

/// Rejected administrator or login input.
///
/// Produced by the parse-and-validate step; the first invalid field wins and
/// storage is never touched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was not supplied.
    #[error("missing property '{0}'")]
    MissingField(String),

    /// A required string field was blank.
    #[error("property '{0}' cannot be empty")]
    EmptyField(String),

    /// A field carried a value of the wrong type.
    #[error("property '{field}' must be {expected}")]
    WrongType {
        /// The field name.
        field: String,
        /// Human description of the expected type.
        expected: &'static str,
    },

    /// A URL field is not an http(s) URL.
    #[error("property '{field}' must be a valid URL; got '{value}'")]
    InvalidUrl {
        /// The field name.
        field: String,
        /// The rejected value.
        value: String,
    },

    /// One or more email-shaped values failed to parse.
    #[error("one or more provided email addresses are invalid: {}", .0.join(", "))]
    InvalidEmail(Vec<String>),

    /// The role name is not a valid identifier.
    #[error("invalid role name '{0}'")]
    InvalidName(String),

    /// The policy list was empty after normalization.
    #[error("at least one policy must be defined")]
    NoPolicies,

    /// The reserved superuser policy was requested.
    #[error("cannot use root policy")]
    RootPolicy,

    /// Neither bound emails nor bound groups were given.
    #[error("at least one email address or group must be set")]
    NoBindings,

    /// A duration was zero or negative.
    #[error("property '{0}' must be a positive duration")]
    NonPositiveDuration(String),

    /// The role's ttl exceeds its max_ttl.
    #[error("ttl ({ttl}s) cannot be greater than max_ttl ({max_ttl}s)")]
    TtlExceedsMaxTtl {
        /// Requested ttl in seconds.
        ttl: u64,
        /// Requested max_ttl in seconds.
        max_ttl: u64,
    },

    /// A JSON blob field could not be parsed.
    #[error("property '{field}' is not valid JSON: {message}")]
    InvalidJson {
        /// The field name.
        field: String,
        /// Parser message.
        message: String,
    },
}

/// Errors surfaced by broker operations.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Administrator or login input was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// No provider configuration has been written yet.
    #[error("missing provider configuration")]
    ConfigMissing,

    /// The named role does not exist.
    #[error("role '{0}' not found")]
    RoleNotFound(String),

    /// Exchanging the authorization code failed.
    #[error("Code exchange failed: {0}")]
    Exchange(#[source] IdpError),

    /// Looking up the authenticated identity failed.
    #[error("Identity lookup failed: {0}")]
    IdentityLookup(#[source] IdpError),

    /// Resolving group membership through the directory failed.
    #[error("Group lookup failed: {0}")]
    GroupLookup(#[source] IdpError),

    /// The identity matches none of the role's bindings.
    #[error("user is not allowed to use role '{role}'")]
    NotAuthorized {
        /// The role the login was attempted against.
        role: String,
    },

    /// The identity's domain differs from the role's bound domain.
    #[error("domain '{actual}' does not match bound domain '{expected}'")]
    DomainMismatch {
        /// The role's bound domain.
        expected: String,
        /// The identity's domain hint (empty if the provider reported none).
        actual: String,
    },

    /// The policy set changed since the lease was issued.
    #[error("policies do not match. new policies: {current:?}. old policies: {stale:?}.")]
    PolicyDrift {
        /// Policies on the lease being renewed.
        stale: Vec<String>,
        /// Policies the role grants now.
        current: Vec<String>,
    },

    /// The lease was not produced by this engine or its state is corrupt.
    #[error("Malformed lease: {0}")]
    MalformedLease(String),

    /// The lease has reached its maximum lifetime and cannot be extended.
    #[error("lease has exceeded its max_ttl and cannot be renewed")]
    LeaseExpired,

    /// An error occurred while reading or writing storage.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An unexpected internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BrokerError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(error: ValidationError) -> Self {
        Self::Validation(error)
    }

    /// Creates a new `RoleNotFound` error.
    #[must_use]
    pub fn role_not_found(role: impl Into<String>) -> Self {
        Self::RoleNotFound(role.into())
    }

    /// Creates a new `NotAuthorized` error.
    #[must_use]
    pub fn not_authorized(role: impl Into<String>) -> Self {
        Self::NotAuthorized { role: role.into() }
    }

    /// Creates a new `DomainMismatch` error.
    #[must_use]
    pub fn domain_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DomainMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Creates a new `PolicyDrift` error.
    #[must_use]
    pub fn policy_drift(stale: Vec<String>, current: Vec<String>) -> Self {
        Self::PolicyDrift { stale, current }
    }

    /// Creates a new `MalformedLease` error.
    #[must_use]
    pub fn malformed_lease(message: impl Into<String>) -> Self {
        Self::MalformedLease(message.into())
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns `true` for errors the host should report to the caller as an
    /// explicit denial message rather than a generic failure.
    #[must_use]
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::ConfigMissing
                | Self::RoleNotFound(_)
                | Self::NotAuthorized { .. }
                | Self::DomainMismatch { .. }
                | Self::PolicyDrift { .. }
                | Self::LeaseExpired
        )
    }

    /// Returns `true` if repeating the same call could succeed without any
    /// administrator or user action.
    ///
    /// A code exchange is never retryable: the code may already be consumed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::IdentityLookup(e) | Self::GroupLookup(e) => e.is_transient(),
            Self::Storage(e) => !e.is_serialization(),
            _ => false,
        }
    }

    /// Returns `true` if this is a client error (bad input or a denial).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.is_denial() || matches!(self, Self::MalformedLease(_) | Self::Exchange(_))
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) => ErrorCategory::Validation,
            Self::ConfigMissing | Self::RoleNotFound(_) => ErrorCategory::Configuration,
            Self::Exchange(_) | Self::IdentityLookup(_) | Self::GroupLookup(_) => {
                ErrorCategory::Federation
            }
            Self::NotAuthorized { .. } | Self::DomainMismatch { .. } => {
                ErrorCategory::Authorization
            }
            Self::PolicyDrift { .. } | Self::MalformedLease(_) | Self::LeaseExpired => {
                ErrorCategory::Lease
            }
            Self::Storage(_) => ErrorCategory::Infrastructure,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Categories of broker errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejected input.
    Validation,
    /// Missing configuration or role.
    Configuration,
    /// External provider or directory failures.
    Federation,
    /// Authenticated but not entitled.
    Authorization,
    /// Lease state or renewal refusals.
    Lease,
    /// Storage errors.
    Infrastructure,
    /// Internal errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Configuration => write!(f, "configuration"),
            Self::Federation => write!(f, "federation"),
            Self::Authorization => write!(f, "authorization"),
            Self::Lease => write!(f, "lease"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
