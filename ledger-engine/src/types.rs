//! Core types for the trading ledger
//!
//! All persisted shapes are designed for:
//! - Deterministic serialization (bincode)
//! - Exact arithmetic (Decimal for quantities and money)
//!
//! Balance records (stock, wallets) are mutable current values; transaction
//! records are immutable audit entries. Neither is ever written outside an
//! atomic ledger unit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Trading location identifier (landing site, plant, office)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationId(String);

impl LocationId {
    /// Create new location ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating unit within a location (boat crew, processing line, cold room)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(String);

impl UnitId {
    /// Create new unit ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Traded item identifier (species or product code)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(String);

impl ItemId {
    /// Create new item ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quality grade identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GradeId(String);

impl GradeId {
    /// Create new grade ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Wallet identifier (cash ledger for a location, unit, or HQ)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(String);

impl WalletId {
    /// Create new wallet ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Operating wallet for a scope
    pub fn for_scope(scope: &Scope) -> Self {
        match scope {
            Scope::Hq => Self("HQ".to_string()),
            Scope::Location(loc) => Self(format!("LOC-{}", loc)),
            Scope::Unit(loc, unit) => Self(format!("UNIT-{}-{}", loc, unit)),
        }
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage state of a stock record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageState {
    /// Raw material as landed
    Raw,
    /// Chilled processed goods
    Cold,
    /// Frozen processed goods
    Frozen,
}

impl StorageState {
    /// Stable code used in keys and reports
    pub fn code(&self) -> &'static str {
        match self {
            StorageState::Raw => "RAW",
            StorageState::Cold => "COLD",
            StorageState::Frozen => "FROZEN",
        }
    }

    /// Parse from code
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RAW" => Some(StorageState::Raw),
            "COLD" => Some(StorageState::Cold),
            "FROZEN" => Some(StorageState::Frozen),
            _ => None,
        }
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Currency code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Currency {
    /// Indonesian Rupiah
    Idr,
    /// US Dollar
    Usd,
}

impl Currency {
    /// ISO 4217 code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Idr => "IDR",
            Currency::Usd => "USD",
        }
    }

    /// Parse from code
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IDR" => Some(Currency::Idr),
            "USD" => Some(Currency::Usd),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Addressable key of one stock balance record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    /// Location holding the stock
    pub location: LocationId,
    /// Unit holding the stock
    pub unit: UnitId,
    /// Storage state
    pub state: StorageState,
    /// Item
    pub item: ItemId,
    /// Quality grade
    pub grade: GradeId,
}

impl StockKey {
    /// Create a stock key
    pub fn new(
        location: LocationId,
        unit: UnitId,
        state: StorageState,
        item: ItemId,
        grade: GradeId,
    ) -> Self {
        Self {
            location,
            unit,
            state,
            item,
            grade,
        }
    }

    /// Stable byte encoding used as the column-family key
    pub fn encode(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.location, self.unit, self.state, self.item, self.grade
        )
    }
}

/// Current stock-on-hand for one key
///
/// Invariant: `quantity_kg` is never negative at a committed state. Created
/// on first credit to the key; rests at zero rather than being deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockRecord {
    /// Balance key
    pub key: StockKey,
    /// Quantity on hand in kilograms
    pub quantity_kg: Decimal,
    /// Last committed write
    pub last_updated: DateTime<Utc>,
}

/// Current balance of one cash wallet
///
/// Invariant: no debit drives `balance` negative. Created on first funding;
/// mutated only inside an atomic ledger unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Wallet identifier
    pub wallet_id: WalletId,
    /// Current balance
    pub balance: Decimal,
    /// Wallet currency
    pub currency: Currency,
    /// Last committed write
    pub last_updated: DateTime<Utc>,
}

/// Organizational boundary within which a role may act or request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    /// Head office, encloses everything
    Hq,
    /// One location and its units
    Location(LocationId),
    /// One unit
    Unit(LocationId, UnitId),
}

impl Scope {
    /// Whether this scope encloses `other` (reflexive)
    pub fn encloses(&self, other: &Scope) -> bool {
        match (self, other) {
            (Scope::Hq, _) => true,
            (Scope::Location(a), Scope::Location(b)) => a == b,
            (Scope::Location(a), Scope::Unit(b, _)) => a == b,
            (Scope::Unit(a, u), Scope::Unit(b, v)) => a == b && u == v,
            _ => false,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Hq => write!(f, "HQ"),
            Scope::Location(loc) => write!(f, "LOC:{}", loc),
            Scope::Unit(loc, unit) => write!(f, "UNIT:{}:{}", loc, unit),
        }
    }
}

/// Operation type recorded in the transaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Raw material purchased into stock
    Receive,
    /// Raw material converted into processed goods
    Produce,
    /// Stock sold for cash
    Sale,
    /// Outbound payment with no credit leg
    Expense,
    /// Money moved between two wallets
    CashTransfer,
    /// External capital credited to a wallet
    CapitalInjection,
    /// Audited absolute overwrite of a stock quantity
    StockAdjustment,
    /// Audited absolute overwrite of a wallet balance
    WalletAdjustment,
}

impl OperationKind {
    /// Stable code used in reports
    pub fn code(&self) -> &'static str {
        match self {
            OperationKind::Receive => "RECEIVE",
            OperationKind::Produce => "PRODUCE",
            OperationKind::Sale => "SALE",
            OperationKind::Expense => "EXPENSE",
            OperationKind::CashTransfer => "CASH_TRANSFER",
            OperationKind::CapitalInjection => "CAPITAL_INJECTION",
            OperationKind::StockAdjustment => "STOCK_ADJUSTMENT",
            OperationKind::WalletAdjustment => "WALLET_ADJUSTMENT",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Transaction record status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Written when a financial request is created; balances untouched
    PendingApproval,
    /// Balances moved, record immutable
    Completed,
    /// Request rejected, no balance effect, record immutable
    Rejected,
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionStatus::PendingApproval => write!(f, "PENDING_APPROVAL"),
            TransactionStatus::Completed => write!(f, "COMPLETED"),
            TransactionStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Immutable audit entry for one operation
///
/// Exactly one record is written per committed operation or per financial
/// request; once written, only the `status` of a record awaiting approval
/// ever changes. Records are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique id (UUIDv7, so the log iterates in time order)
    pub transaction_id: Uuid,
    /// Operation type
    pub kind: OperationKind,
    /// Record status
    pub status: TransactionStatus,
    /// Stock key debited, if any
    pub source_stock: Option<StockKey>,
    /// Stock key credited (or overwritten, for adjustments), if any
    pub target_stock: Option<StockKey>,
    /// Wallet debited, if any
    pub source_wallet: Option<WalletId>,
    /// Wallet credited (or overwritten, for adjustments), if any
    pub target_wallet: Option<WalletId>,
    /// Quantity credited to `target_stock` (absolute value for adjustments)
    pub quantity_kg: Option<Decimal>,
    /// Quantity consumed from `source_stock` by production
    pub raw_used_kg: Option<Decimal>,
    /// Money moved (absolute value for wallet adjustments)
    pub amount: Option<Decimal>,
    /// Commit timestamp
    pub timestamp: DateTime<Utc>,
    /// Free-form description
    pub description: String,
}

/// Kind of a financial request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    /// Ask to spend from the scope's wallet
    Expense,
    /// Ask for funds from the treasury into the scope's wallet
    Funding,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestType::Expense => write!(f, "EXPENSE"),
            RequestType::Funding => write!(f, "FUNDING"),
        }
    }
}

/// Financial request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Awaiting a decision
    Pending,
    /// Approved and its ledger operation committed (terminal)
    Approved,
    /// Rejected with no ledger effect (terminal)
    Rejected,
}

impl RequestStatus {
    /// Terminal states are immutable
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Approved => write!(f, "APPROVED"),
            RequestStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Action recorded in a request's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestAction {
    /// Request created by the requester
    Created,
    /// Request approved
    Approved,
    /// Request rejected
    Rejected,
}

/// One append-only history entry on a financial request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// What happened
    pub action: RequestAction,
    /// Who did it
    pub actor: String,
    /// When
    pub timestamp: DateTime<Utc>,
    /// Optional note (rejection reason, approval remark)
    pub note: Option<String>,
}

/// A pending ask for funds or expense approval
///
/// Lifecycle: `Pending` then exactly one of `Approved` / `Rejected`;
/// terminal states never change and history entries are never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialRequest {
    /// Unique request id
    pub request_id: Uuid,
    /// Who asked
    pub requester_id: String,
    /// Expense or funding
    pub kind: RequestType,
    /// Amount requested
    pub amount: Decimal,
    /// Scope the money is for
    pub scope: Scope,
    /// Current status
    pub status: RequestStatus,
    /// Free-form description
    pub description: String,
    /// Linked transaction record (written PENDING_APPROVAL at creation)
    pub transaction_id: Uuid,
    /// Append-only audit trail
    pub history: Vec<HistoryEntry>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last transition timestamp
    pub updated_at: DateTime<Utc>,
}

impl FinancialRequest {
    /// Create a new pending request with its opening history entry
    pub fn new(
        request_id: Uuid,
        requester_id: impl Into<String>,
        kind: RequestType,
        amount: Decimal,
        scope: Scope,
        description: impl Into<String>,
        transaction_id: Uuid,
    ) -> Self {
        let requester_id = requester_id.into();
        let now = Utc::now();
        Self {
            request_id,
            requester_id: requester_id.clone(),
            kind,
            amount,
            scope,
            status: RequestStatus::Pending,
            description: description.into(),
            transaction_id,
            history: vec![HistoryEntry {
                action: RequestAction::Created,
                actor: requester_id,
                timestamp: now,
                note: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }
}

/// One business operation, the atomic unit of work
///
/// Callers never touch balance records directly; every variant resolves to
/// a fixed set of balance keys that are read, validated, and written inside
/// one unit together with exactly one [`TransactionRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Operation {
    /// Buy raw material into RAW stock, paying from a wallet
    Receive {
        /// Receiving location
        location: LocationId,
        /// Receiving unit
        unit: UnitId,
        /// Item received
        item: ItemId,
        /// Grade received
        grade: GradeId,
        /// Quantity received (kg, must be positive)
        quantity_kg: Decimal,
        /// Purchase price per kg (must be non-negative)
        unit_price: Decimal,
        /// Wallet paying for the purchase
        wallet: WalletId,
    },
    /// Convert RAW stock into processed goods; yield loss is expected
    Produce {
        /// Processing location
        location: LocationId,
        /// Processing unit
        unit: UnitId,
        /// Item processed
        item: ItemId,
        /// Grade processed
        grade: GradeId,
        /// Raw input consumed (kg, must be positive)
        raw_used_kg: Decimal,
        /// Output storage state (must not be RAW)
        output_state: StorageState,
        /// Output produced (kg, must be positive)
        output_quantity_kg: Decimal,
    },
    /// Sell stock, crediting the owning wallet
    Sale {
        /// Selling location
        location: LocationId,
        /// Selling unit
        unit: UnitId,
        /// Storage state sold from
        state: StorageState,
        /// Item sold
        item: ItemId,
        /// Grade sold
        grade: GradeId,
        /// Quantity sold (kg, must be positive)
        quantity_kg: Decimal,
        /// Sale price per kg (must be non-negative)
        unit_price: Decimal,
        /// Wallet receiving the proceeds
        wallet: WalletId,
    },
    /// Pay an external recipient; debit leg only
    Expense {
        /// Paying wallet
        wallet: WalletId,
        /// Amount (must be positive)
        amount: Decimal,
        /// External recipient
        recipient: String,
    },
    /// Move money between two wallets
    CashTransfer {
        /// Debited wallet
        source: WalletId,
        /// Credited wallet (created on first funding)
        target: WalletId,
        /// Amount (must be positive)
        amount: Decimal,
    },
    /// Credit external capital into a wallet
    CapitalInjection {
        /// Credited wallet (created on first funding)
        wallet: WalletId,
        /// Amount (must be positive)
        amount: Decimal,
        /// Wallet currency
        currency: Currency,
        /// Where the money came from
        source: String,
    },
    /// Administrative absolute overwrite of a stock quantity, fully logged
    AdjustStock {
        /// Stock key to overwrite
        key: StockKey,
        /// New absolute quantity (must be non-negative)
        new_quantity_kg: Decimal,
        /// Why the correction was needed
        reason: String,
    },
    /// Administrative absolute overwrite of a wallet balance, fully logged
    AdjustWallet {
        /// Wallet to overwrite
        wallet: WalletId,
        /// New absolute balance (must be non-negative)
        new_balance: Decimal,
        /// Wallet currency (used if the wallet must be created)
        currency: Currency,
        /// Why the correction was needed
        reason: String,
    },
}

impl Operation {
    /// Transaction-log kind for this operation
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Receive { .. } => OperationKind::Receive,
            Operation::Produce { .. } => OperationKind::Produce,
            Operation::Sale { .. } => OperationKind::Sale,
            Operation::Expense { .. } => OperationKind::Expense,
            Operation::CashTransfer { .. } => OperationKind::CashTransfer,
            Operation::CapitalInjection { .. } => OperationKind::CapitalInjection,
            Operation::AdjustStock { .. } => OperationKind::StockAdjustment,
            Operation::AdjustWallet { .. } => OperationKind::WalletAdjustment,
        }
    }
}
