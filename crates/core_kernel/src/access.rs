//! Caller identity and role-based authorization
//!
//! Authentication lives outside this workspace; the transport layer hands
//! the core an opaque caller identity plus a role claim. The core only
//! decides whether that role may run a given ledger-mutating operation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Role claim attached to an authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
    Manager,
    Customer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Employee => "employee",
            Role::Manager => "manager",
            Role::Customer => "customer",
        };
        write!(f, "{s}")
    }
}

/// Opaque caller identity consumed from the authentication layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub id: String,
    pub username: String,
    pub role: Role,
}

impl CallerIdentity {
    pub fn new(id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            role,
        }
    }
}

/// Ledger operations that require a role check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectedOp {
    GenerateSchedule,
    CloseLoan,
    MarkDefault,
    RemoveDefault,
}

impl ProtectedOp {
    /// Roles permitted to run this operation
    pub fn allowed_roles(&self) -> &'static [Role] {
        match self {
            ProtectedOp::GenerateSchedule | ProtectedOp::CloseLoan => {
                &[Role::Admin, Role::Employee]
            }
            ProtectedOp::MarkDefault => &[Role::Admin, Role::Manager],
            ProtectedOp::RemoveDefault => &[Role::Admin],
        }
    }

    fn name(&self) -> &'static str {
        match self {
            ProtectedOp::GenerateSchedule => "generate-schedule",
            ProtectedOp::CloseLoan => "close-loan",
            ProtectedOp::MarkDefault => "mark-default",
            ProtectedOp::RemoveDefault => "remove-default",
        }
    }
}

/// Authorization failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Role {role} may not perform {operation}")]
    Forbidden { role: Role, operation: String },
}

/// Checks that the caller's role may perform the operation
pub fn authorize(caller: &CallerIdentity, op: ProtectedOp) -> Result<(), AccessError> {
    if op.allowed_roles().contains(&caller.role) {
        Ok(())
    } else {
        Err(AccessError::Forbidden {
            role: caller.role,
            operation: op.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(role: Role) -> CallerIdentity {
        CallerIdentity::new("u-1", "ops.user", role)
    }

    #[test]
    fn test_schedule_and_close_allow_admin_and_employee() {
        for op in [ProtectedOp::GenerateSchedule, ProtectedOp::CloseLoan] {
            assert!(authorize(&caller(Role::Admin), op).is_ok());
            assert!(authorize(&caller(Role::Employee), op).is_ok());
            assert!(authorize(&caller(Role::Manager), op).is_err());
            assert!(authorize(&caller(Role::Customer), op).is_err());
        }
    }

    #[test]
    fn test_mark_default_requires_admin_or_manager() {
        assert!(authorize(&caller(Role::Admin), ProtectedOp::MarkDefault).is_ok());
        assert!(authorize(&caller(Role::Manager), ProtectedOp::MarkDefault).is_ok());
        assert!(authorize(&caller(Role::Employee), ProtectedOp::MarkDefault).is_err());
    }

    #[test]
    fn test_remove_default_is_admin_only() {
        assert!(authorize(&caller(Role::Admin), ProtectedOp::RemoveDefault).is_ok());
        assert!(authorize(&caller(Role::Manager), ProtectedOp::RemoveDefault).is_err());
        assert!(authorize(&caller(Role::Employee), ProtectedOp::RemoveDefault).is_err());
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        let json = serde_json::to_string(&Role::Employee).unwrap();
        assert_eq!(json, "\"employee\"");
    }
}
