//! Security event audit logging.
//!
//! Events go to the `idbroker::audit` tracing target:
//!
//! - Logins and renewals, successful or denied
//! - Configuration writes
//! - Role upserts and deletions
//!
//! Which events are recorded is controlled by [`AuditSettings`]. Secrets
//! never appear in audit events.

use std::fmt;

use crate::error::BrokerError;
use crate::settings::AuditSettings;

/// Tracing target of audit events.
pub const AUDIT_TARGET: &str = "idbroker::audit";

/// Kinds of audited events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    /// A login issued a lease.
    LoginSucceeded,
    /// A login was denied or failed.
    LoginFailed,
    /// A lease was renewed.
    RenewSucceeded,
    /// A renewal was denied or failed.
    RenewFailed,
    /// The provider configuration was written.
    ConfigWritten,
    /// A role was created or replaced.
    RoleWritten,
    /// A role was deleted.
    RoleDeleted,
}

impl AuditAction {
    /// Returns `true` for events that change broker state.
    #[must_use]
    pub fn is_admin_change(self) -> bool {
        matches!(self, Self::ConfigWritten | Self::RoleWritten | Self::RoleDeleted)
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoginSucceeded => "login.success",
            Self::LoginFailed => "login.failure",
            Self::RenewSucceeded => "renew.success",
            Self::RenewFailed => "renew.failure",
            Self::ConfigWritten => "config.write",
            Self::RoleWritten => "role.write",
            Self::RoleDeleted => "role.delete",
        };
        f.write_str(name)
    }
}

/// Writes audit events according to the configured settings.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    settings: AuditSettings,
}

impl AuditLog {
    /// Creates an audit log.
    #[must_use]
    pub fn new(settings: AuditSettings) -> Self {
        Self { settings }
    }

    /// Returns `true` if events of `action` are recorded.
    #[must_use]
    pub fn is_enabled(&self, action: AuditAction) -> bool {
        if action.is_admin_change() {
            return self.settings.log_admin_changes;
        }
        match action {
            AuditAction::LoginSucceeded | AuditAction::RenewSucceeded => {
                self.settings.log_successful_auth
            }
            _ => self.settings.log_failed_auth,
        }
    }

    /// Records a successful login or renewal.
    pub fn auth_succeeded(&self, action: AuditAction, role: &str, email: &str) {
        if self.is_enabled(action) {
            tracing::info!(
                target: AUDIT_TARGET,
                action = %action,
                role = %role,
                email = %email,
                "auth succeeded"
            );
        }
    }

    /// Records a denied or failed login or renewal.
    pub fn auth_failed(&self, action: AuditAction, role: Option<&str>, error: &BrokerError) {
        if self.is_enabled(action) {
            tracing::warn!(
                target: AUDIT_TARGET,
                action = %action,
                role = role.unwrap_or(""),
                category = %error.category(),
                denial = error.is_denial(),
                error = %error,
                "auth failed"
            );
        }
    }

    /// Records an administrative change. `subject` names what changed.
    pub fn admin_change(&self, action: AuditAction, subject: &str) {
        if self.is_enabled(action) {
            tracing::info!(
                target: AUDIT_TARGET,
                action = %action,
                subject = %subject,
                "admin change"
            );
        }
    }
}
