//! Approval workflow state machine
//!
//! States: PENDING -> { APPROVED, REJECTED } (terminal). Creation writes
//! the request together with a PENDING_APPROVAL transaction record; a
//! decision flips both atomically, executing the ledger operation on
//! approval. The ledger enforces the terminal-state guard, so two racing
//! approvers cannot both move money.

use crate::{
    error::Result,
    profile::{authorize_decision, authorize_request, UserProfile},
};
use ledger_engine::{
    FinancialRequest, Ledger, Operation, OperationKind, RequestStatus, RequestType, Scope,
    TransactionRecord, TransactionStatus, WalletId,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Workflow configuration
#[derive(Debug, Clone)]
pub struct ApprovalConfig {
    /// Wallet that funds approved FUNDING requests
    pub treasury_wallet: WalletId,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            treasury_wallet: WalletId::for_scope(&Scope::Hq),
        }
    }
}

/// Decision on a pending request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Execute the ledger operation and mark the request APPROVED
    Approve,
    /// Mark the request REJECTED with no ledger effect
    Reject,
}

/// Approval workflow over a shared ledger
pub struct ApprovalWorkflow {
    ledger: Arc<Ledger>,
    config: ApprovalConfig,
}

impl ApprovalWorkflow {
    /// Create a workflow over the given ledger
    pub fn new(ledger: Arc<Ledger>, config: ApprovalConfig) -> Self {
        Self { ledger, config }
    }

    /// Create a pending request within the requester's scope
    pub async fn create_request(
        &self,
        requester: &UserProfile,
        kind: RequestType,
        amount: Decimal,
        scope: Scope,
        description: impl Into<String>,
    ) -> Result<Uuid> {
        authorize_request(requester, &scope)?;

        let request = FinancialRequest::new(
            Uuid::now_v7(),
            requester.user_id.clone(),
            kind,
            amount,
            scope,
            description,
            Uuid::now_v7(),
        );
        let record = self.pending_record(&request);
        self.ledger.create_request(&request, &record).await?;

        tracing::info!(
            request_id = %request.request_id,
            requester = %requester.user_id,
            kind = %kind,
            amount = %amount,
            "request created"
        );
        Ok(request.request_id)
    }

    /// Decide a pending request
    ///
    /// On approval the ledger operation runs atomically with the state
    /// transition; a failure (say, insufficient funds) leaves the request
    /// PENDING and is surfaced to the approver. A decision on a request
    /// already in a terminal state fails without touching anything.
    pub async fn decide(
        &self,
        approver: &UserProfile,
        request_id: Uuid,
        decision: Decision,
        reason: Option<String>,
    ) -> Result<FinancialRequest> {
        let request = self
            .ledger
            .get_request(request_id)?
            .ok_or(ledger_engine::Error::RequestNotFound(request_id))?;
        authorize_decision(approver, &request)?;

        let decided = match decision {
            Decision::Approve => {
                let op = self.operation_for(&request);
                self.ledger
                    .commit_decision(
                        request_id,
                        &approver.user_id,
                        RequestStatus::Approved,
                        reason,
                        Some(op),
                    )
                    .await?
            }
            Decision::Reject => {
                self.ledger
                    .commit_decision(
                        request_id,
                        &approver.user_id,
                        RequestStatus::Rejected,
                        reason,
                        None,
                    )
                    .await?
            }
        };
        Ok(decided)
    }

    /// Look up a request
    pub fn request(&self, request_id: Uuid) -> Result<Option<FinancialRequest>> {
        Ok(self.ledger.get_request(request_id)?)
    }

    /// Ledger operation an approval of this request executes
    fn operation_for(&self, request: &FinancialRequest) -> Operation {
        match request.kind {
            RequestType::Expense => Operation::Expense {
                wallet: WalletId::for_scope(&request.scope),
                amount: request.amount,
                recipient: request.description.clone(),
            },
            RequestType::Funding => Operation::CashTransfer {
                source: self.config.treasury_wallet.clone(),
                target: WalletId::for_scope(&request.scope),
                amount: request.amount,
            },
        }
    }

    /// Transaction record written at creation, awaiting the decision
    fn pending_record(&self, request: &FinancialRequest) -> TransactionRecord {
        let (kind, source_wallet, target_wallet) = match request.kind {
            RequestType::Expense => (
                OperationKind::Expense,
                Some(WalletId::for_scope(&request.scope)),
                None,
            ),
            RequestType::Funding => (
                OperationKind::CashTransfer,
                Some(self.config.treasury_wallet.clone()),
                Some(WalletId::for_scope(&request.scope)),
            ),
        };
        TransactionRecord {
            transaction_id: request.transaction_id,
            kind,
            status: TransactionStatus::PendingApproval,
            source_stock: None,
            target_stock: None,
            source_wallet,
            target_wallet,
            quantity_kg: None,
            raw_used_kg: None,
            amount: Some(request.amount),
            timestamp: Utc::now(),
            description: request.description.clone(),
        }
    }
}
