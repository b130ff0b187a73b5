use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    auth::{AuthUser, ClientIp},
    models::{AuditLog, UserRole},
    repository::RepositoryState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Payment,
    StatusChange,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "Create",
            AuditAction::Update => "Update",
            AuditAction::Delete => "Delete",
            AuditAction::Login => "Login",
            AuditAction::Payment => "Payment",
            AuditAction::StatusChange => "StatusChange",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AuditEntry
///
/// Builder for one audit trail row, attributed to the acting user.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    user_id: Uuid,
    user_role: UserRole,
    action: AuditAction,
    entity: &'static str,
    entity_id: Option<String>,
    details: Option<Value>,
    ip_address: Option<String>,
}

impl AuditEntry {
    pub fn new(actor: &AuthUser, action: AuditAction, entity: &'static str) -> Self {
        Self {
            user_id: actor.id,
            user_role: actor.role,
            action,
            entity,
            entity_id: None,
            details: None,
            ip_address: None,
        }
    }

    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn ip(mut self, ip: &ClientIp) -> Self {
        self.ip_address = ip.0.clone();
        self
    }

    pub fn into_log(self, at: DateTime<Utc>) -> AuditLog {
        AuditLog {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            user_role: self.user_role.to_string(),
            action: self.action.to_string(),
            entity: self.entity.to_string(),
            entity_id: self.entity_id,
            details: self.details,
            ip_address: self.ip_address,
            timestamp: at,
        }
    }
}

/// record
///
/// Appends the entry to the audit trail. A failed write is logged and swallowed: the
/// operation being audited has already succeeded.
pub async fn record(repo: &RepositoryState, entry: AuditEntry) {
    let action = entry.action;
    let entity = entry.entity;

    if let Err(e) = repo.record_audit(entry.into_log(Utc::now())).await {
        tracing::warn!(error = %e, %action, entity, "failed to write audit log");
    }
}
