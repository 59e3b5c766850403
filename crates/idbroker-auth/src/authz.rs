//! Authorization of a resolved identity against a role.

use std::collections::BTreeSet;

use crate::BrokerResult;
use crate::error::BrokerError;
use crate::federation::ResolvedIdentity;
use crate::role::Role;

/// Matches `identity` against `role` and returns the policies it grants.
///
/// The domain check runs first when the role has a bound domain; domains
/// compare ASCII case-insensitively. The identity is then authorized if its
/// email is bound, or if any of its groups is bound. Email and group matching
/// is exact and case-sensitive.
///
/// # Errors
///
/// Returns `BrokerError::DomainMismatch` or `BrokerError::NotAuthorized`;
/// no policies are returned on failure.
pub fn authorize(
    role_name: &str,
    role: &Role,
    identity: &ResolvedIdentity,
) -> BrokerResult<Vec<String>> {
    if role.has_bound_domain()
        && let Some(bound_domain) = role.bound_domain.as_deref()
        && !bound_domain.eq_ignore_ascii_case(&identity.domain)
    {
        return Err(BrokerError::domain_mismatch(bound_domain, identity.domain.clone()));
    }

    let email_bound = role.bound_emails.iter().any(|e| *e == identity.email);
    let group_bound = || {
        identity
            .groups
            .iter()
            .any(|g| role.bound_groups.contains(g))
    };

    if email_bound || group_bound() {
        Ok(role.policies.clone())
    } else {
        Err(BrokerError::not_authorized(role_name))
    }
}

/// Returns `true` if both policy lists hold the same set of names.
#[must_use]
pub fn same_policy_set(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() == b.iter().collect::<BTreeSet<_>>()
}
