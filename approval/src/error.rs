//! Error types for the approval workflow

use ledger_engine::Scope;
use thiserror::Error;

/// Result type for approval operations
pub type Result<T> = std::result::Result<T, Error>;

/// Approval errors
#[derive(Error, Debug)]
pub enum Error {
    /// Ledger error (including insufficient funds on approval)
    #[error("Ledger error: {0}")]
    Ledger(#[from] ledger_engine::Error),

    /// Actor's scope does not enclose the request's scope
    #[error("Scope violation: {actor} (scope {actor_scope}) may not act on {request_scope}")]
    ScopeViolation {
        /// Who tried
        actor: String,
        /// Their scope
        actor_scope: Scope,
        /// The scope they tried to act on
        request_scope: Scope,
    },

    /// Requesters may not approve their own requests
    #[error("Self-approval forbidden: {0} created this request")]
    SelfApproval(String),
}
