//! Leases issued on login and extended on renewal.
//!
//! A [`Lease`] is owned by the calling credential system. Its internal data
//! is only interpreted by the [`LeaseController`].

mod controller;

pub use controller::LeaseController;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::BrokerResult;
use crate::error::BrokerError;

/// Metadata key holding the resolved email.
pub const METADATA_USERNAME: &str = "username";

/// Metadata key holding the hosted domain hint.
pub const METADATA_DOMAIN: &str = "domain";

/// Internal data key holding the encoded provider token.
pub const INTERNAL_TOKEN: &str = "token";

/// Internal data key holding the originating role name.
pub const INTERNAL_ROLE: &str = "role";

/// Lease timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseOptions {
    /// Time to live from issue or last renewal.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    /// Maximum lifetime from the original issue time.
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,

    /// Whether the lease may be renewed.
    pub renewable: bool,

    /// When the lease was first issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issue_time: OffsetDateTime,
}

impl LeaseOptions {
    /// Creates renewable lease options issued at `issue_time`.
    #[must_use]
    pub fn new(ttl: Duration, max_ttl: Duration, issue_time: OffsetDateTime) -> Self {
        Self {
            ttl,
            max_ttl,
            renewable: true,
            issue_time,
        }
    }

    /// Computes the options after extending the lease at `now`.
    ///
    /// A zero `ttl` keeps the current TTL. The new TTL is capped so the lease
    /// never outlives `issue_time + max_ttl`. A zero `max_ttl`, or one whose
    /// deadline lies past the representable calendar, means no cap.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::LeaseExpired` if the lease is not renewable or
    /// has already reached its maximum lifetime.
    pub fn extend(
        &self,
        ttl: Duration,
        max_ttl: Duration,
        now: OffsetDateTime,
    ) -> BrokerResult<Self> {
        if !self.renewable {
            return Err(BrokerError::LeaseExpired);
        }

        let mut ttl = if ttl.is_zero() { self.ttl } else { ttl };

        if let Some(deadline) = deadline(self.issue_time, max_ttl) {
            if now >= deadline {
                return Err(BrokerError::LeaseExpired);
            }
            let remaining = Duration::try_from(deadline - now)
                .map_err(|e| BrokerError::internal(format!("lease clock: {e}")))?;
            ttl = ttl.min(remaining);
        }

        Ok(Self {
            ttl,
            max_ttl,
            renewable: self.renewable,
            issue_time: self.issue_time,
        })
    }
}

/// Returns `issue_time + max_ttl`, or `None` when there is no cap.
fn deadline(issue_time: OffsetDateTime, max_ttl: Duration) -> Option<OffsetDateTime> {
    if max_ttl.is_zero() {
        return None;
    }
    time::Duration::try_from(max_ttl)
        .ok()
        .and_then(|max_ttl| issue_time.checked_add(max_ttl))
}

/// An authorization result handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    /// Display name (the resolved email).
    pub display_name: String,

    /// Granted policies.
    pub policies: Vec<String>,

    /// Public metadata.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Opaque renewal state.
    #[serde(default)]
    pub internal_data: BTreeMap<String, String>,

    /// Timing.
    pub options: LeaseOptions,
}

impl Lease {
    /// Returns the resolved email recorded at login.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.metadata.get(METADATA_USERNAME).map(String::as_str)
    }
}
