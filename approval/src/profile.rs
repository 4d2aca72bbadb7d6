//! User profiles and the centralized scope check
//!
//! Profiles come from the external identity service; the workflow treats
//! them as read-only capability input. Both request creation and decisions
//! go through the same two functions here, so there is exactly one place
//! where authorization is decided.

use crate::error::{Error, Result};
use ledger_engine::{FinancialRequest, Scope};
use serde::{Deserialize, Serialize};

/// Role of a platform user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    /// Head-office administrator, acts anywhere
    HqAdmin,
    /// Location manager, acts within one location
    LocManager,
    /// Unit operator, acts within one unit
    UnitOp,
}

/// Read-only capability lookup for one user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// User identifier
    pub user_id: String,
    /// Role
    pub role: Role,
    /// Boundary the role acts within
    pub scope: Scope,
}

impl UserProfile {
    /// Create a profile
    pub fn new(user_id: impl Into<String>, role: Role, scope: Scope) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            scope,
        }
    }
}

/// May this requester open a request for this scope?
///
/// A UnitOp may only request within their own unit, a LocManager within
/// their own location, an HqAdmin anywhere; all three reduce to scope
/// enclosure.
pub fn authorize_request(requester: &UserProfile, scope: &Scope) -> Result<()> {
    if requester.scope.encloses(scope) {
        Ok(())
    } else {
        Err(Error::ScopeViolation {
            actor: requester.user_id.clone(),
            actor_scope: requester.scope.clone(),
            request_scope: scope.clone(),
        })
    }
}

/// May this approver decide this request?
///
/// The approver's scope must enclose the request's scope, and the original
/// requester may never decide their own request.
pub fn authorize_decision(approver: &UserProfile, request: &FinancialRequest) -> Result<()> {
    if approver.user_id == request.requester_id {
        return Err(Error::SelfApproval(approver.user_id.clone()));
    }
    if !approver.scope.encloses(&request.scope) {
        return Err(Error::ScopeViolation {
            actor: approver.user_id.clone(),
            actor_scope: approver.scope.clone(),
            request_scope: request.scope.clone(),
        });
    }
    Ok(())
}
