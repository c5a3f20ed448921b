//! Administrator authorization gate.

use std::collections::HashSet;

/// Verified caller identity, supplied by the upstream identity layer.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    /// Stable identity-provider subject.
    pub external_id: String,
    /// Verified email address.
    pub email: String,
}

/// Allow-list predicate for privileged operations.
///
/// A caller is authorized when its stable identifier or verified email is on
/// the configured allow-list. Unresolved identity is never authorized: the
/// gate fails closed.
pub struct AdminGate {
    allowed_ids: HashSet<String>,
    allowed_emails: HashSet<String>,
}

impl AdminGate {
    pub fn new(account_ids: &[String], emails: &[String]) -> Self {
        Self {
            allowed_ids: account_ids
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            allowed_emails: emails
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_authorized(&self, identity: Option<&CallerIdentity>) -> bool {
        match identity {
            None => false,
            Some(id) => {
                self.allowed_ids.contains(&id.external_id)
                    || self.allowed_emails.contains(&id.email.to_lowercase())
            }
        }
    }
}
