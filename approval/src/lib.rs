//! Approval workflow for financial requests
//!
//! Gates expense and funding operations behind a second party's sign-off.
//! A request is created inside the requester's scope, then approved or
//! rejected by someone whose scope encloses it; approval executes the
//! corresponding ledger operation atomically with the state transition, so
//! a request only reaches APPROVED if the money actually moved.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod error;
pub mod profile;
pub mod workflow;

// Re-exports
pub use error::{Error, Result};
pub use profile::{authorize_decision, authorize_request, Role, UserProfile};
pub use workflow::{ApprovalConfig, ApprovalWorkflow, Decision};
