//! Role model.
//!
//! A role binds identity predicates (emails, groups and an optional hosted
//! domain) to a policy set and lease TTL bounds. Roles are only ever built
//! through [`RoleInput::parse`], so a [`Role`] value always satisfies its
//! invariants.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::fields::FieldData;

/// Lease TTL used when a role does not set `ttl`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Maximum lease lifetime used when a role does not set `max_ttl`.
pub const DEFAULT_MAX_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The reserved superuser policy that no role may grant.
pub const ROOT_POLICY: &str = "root";

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\w(([\w.-]+)?\w)?$").expect("Invalid role name regex")
});

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s<>,;]+@[^@\s<>,;]+$").expect("Invalid email regex")
});

/// Returns `true` if `name` is an acceptable role name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    NAME_REGEX.is_match(name)
}

/// Returns `true` if `value` is syntactically an email address.
#[must_use]
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// Normalizes a role name for storage lookups.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A validated role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Policies granted on login, in administrator order.
    pub policies: Vec<String>,

    /// Email addresses allowed to log in.
    #[serde(default)]
    pub bound_emails: Vec<String>,

    /// Group email addresses whose members may log in.
    #[serde(default)]
    pub bound_groups: Vec<String>,

    /// Hosted domain the identity must belong to, when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_domain: Option<String>,

    /// Lease TTL.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum lease lifetime across renewals.
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
}

impl Role {
    /// Returns `true` if the role restricts logins to a hosted domain.
    #[must_use]
    pub fn has_bound_domain(&self) -> bool {
        self.bound_domain.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// Parsed upsert-role request: the normalized role name plus the role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInput {
    /// Lowercased role name.
    pub name: String,
    /// The validated role.
    pub role: Role,
}

impl RoleInput {
    /// Parses and validates an upsert-role request.
    ///
    /// Checks run in field order and the first failure is returned. Omitted
    /// optional fields take their defaults; nothing is inherited from a
    /// previously stored role.
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` encountered.
    pub fn parse(fields: &FieldData) -> Result<Self, ValidationError> {
        let name = normalize_name(&fields.required_string("name")?);
        if !is_valid_name(&name) {
            return Err(ValidationError::InvalidName(name));
        }

        let policies = normalize_policies(fields.string_list("policies")?.unwrap_or_default())?;

        let bound_emails = dedup(fields.string_list("bound_emails")?.unwrap_or_default());
        check_emails(&bound_emails)?;

        let bound_groups = dedup(fields.string_list("bound_groups")?.unwrap_or_default());
        check_emails(&bound_groups)?;

        if bound_emails.is_empty() && bound_groups.is_empty() {
            return Err(ValidationError::NoBindings);
        }

        let bound_domain = fields
            .string("bound_domain")?
            .map(|d| d.trim().to_lowercase())
            .filter(|d| !d.is_empty());

        let ttl = fields.positive_duration("ttl")?.unwrap_or(DEFAULT_TTL);
        let max_ttl = fields.positive_duration("max_ttl")?.unwrap_or(DEFAULT_MAX_TTL);
        if ttl > max_ttl {
            return Err(ValidationError::TtlExceedsMaxTtl {
                ttl: ttl.as_secs(),
                max_ttl: max_ttl.as_secs(),
            });
        }

        Ok(Self {
            name,
            role: Role {
                policies,
                bound_emails,
                bound_groups,
                bound_domain,
                ttl,
                max_ttl,
            },
        })
    }
}

/// Lowercases and de-duplicates policies, keeping first occurrences.
fn normalize_policies(raw: Vec<String>) -> Result<Vec<String>, ValidationError> {
    let policies = dedup(raw.into_iter().map(|p| p.to_lowercase()).collect());
    if policies.iter().any(|p| p == ROOT_POLICY) {
        return Err(ValidationError::RootPolicy);
    }
    if policies.is_empty() {
        return Err(ValidationError::NoPolicies);
    }
    Ok(policies)
}

fn check_emails(values: &[String]) -> Result<(), ValidationError> {
    let invalid: Vec<String> = values
        .iter()
        .filter(|v| !is_valid_email(v))
        .cloned()
        .collect();
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::InvalidEmail(invalid))
    }
}

fn dedup(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
