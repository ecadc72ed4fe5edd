//! Batch operation requests and per-entry results
//!
//! The engine accepts batches; every entry succeeds or fails independently.
//! Per-entry failures are ordinary values so callers can attribute each
//! outcome to its entry by position.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AccountId, AccountType, Currency, Money, TransferId, TransferKind};

/// Request to create one ledger account
///
/// `ledger`, `code` and `flags` are accepted raw and validated by the engine
/// so that invalid wire input maps to a reason code instead of a parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAccount {
    /// Caller-supplied identifier; engine-allocated when absent
    pub id: Option<AccountId>,

    /// Ledger code (ISO 4217 numeric currency code)
    pub ledger: u32,

    /// Account type code
    pub code: u16,

    /// Flag bits; no flags are currently defined, so any set bit is invalid
    pub flags: u16,

    /// Optional caller tag
    pub user_tag: Option<String>,
}

impl NewAccount {
    /// Well-formed account spec for a currency and type
    pub fn for_type(currency: Currency, account_type: AccountType) -> Self {
        Self {
            id: None,
            ledger: currency.ledger_code(),
            code: account_type.code(),
            flags: 0,
            user_tag: None,
        }
    }

    /// Set an explicit identifier
    pub fn with_id(mut self, id: AccountId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the caller tag
    pub fn with_user_tag(mut self, tag: impl Into<String>) -> Self {
        self.user_tag = Some(tag.into());
        self
    }
}

/// Per-entry account creation failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateAccountError {
    /// An account with the supplied id already exists
    #[error("account exists")]
    Exists,

    /// Ledger code does not name a configured currency book
    #[error("ledger mismatch")]
    LedgerMismatch,

    /// Type code does not name a known account type
    #[error("code invalid")]
    CodeInvalid,

    /// Unsupported flag bits set
    #[error("flags invalid")]
    FlagsInvalid,
}

/// Per-entry result: the assigned id or the reason code
pub type CreateAccountResult = std::result::Result<AccountId, CreateAccountError>;

/// Transfer operation selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOp {
    /// Post debit and credit immediately
    SinglePhase,
    /// Reserve funds, awaiting post or void
    Pending,
    /// Post a referenced pending transfer
    PostPending,
    /// Void a referenced pending transfer
    VoidPending,
}

/// Request to create one transfer (or resolve a pending one)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransfer {
    /// Caller-supplied identifier; engine-allocated when absent
    pub id: Option<TransferId>,

    /// Account to debit
    pub debit_account_id: AccountId,

    /// Account to credit
    pub credit_account_id: AccountId,

    /// Amount to move; for post/void, zero means "the pending amount"
    pub amount: Money,

    /// Business meaning recorded on the transfer
    pub kind: TransferKind,

    /// Operation
    pub op: TransferOp,

    /// Pending transfer referenced by post/void operations
    pub pending_id: Option<TransferId>,

    /// Reservation lifetime in seconds (pending operations only)
    pub timeout_secs: Option<u64>,

    /// Optional caller tag (invoice id, external reference)
    pub reference: Option<String>,
}

impl NewTransfer {
    /// Single-phase transfer between two accounts
    pub fn single_phase(
        debit_account_id: AccountId,
        credit_account_id: AccountId,
        amount: Money,
        kind: TransferKind,
    ) -> Self {
        Self {
            id: None,
            debit_account_id,
            credit_account_id,
            amount,
            kind,
            op: TransferOp::SinglePhase,
            pending_id: None,
            timeout_secs: None,
            reference: None,
        }
    }

    /// Two-phase reservation
    pub fn pending(
        debit_account_id: AccountId,
        credit_account_id: AccountId,
        amount: Money,
        kind: TransferKind,
    ) -> Self {
        Self {
            op: TransferOp::Pending,
            ..Self::single_phase(debit_account_id, credit_account_id, amount, kind)
        }
    }

    /// Post a pending transfer for its full amount
    pub fn post(pending_id: TransferId, amount_hint: Money, kind: TransferKind) -> Self {
        Self {
            id: None,
            debit_account_id: AccountId::new(0),
            credit_account_id: AccountId::new(0),
            amount: Money::zero(amount_hint.currency()),
            kind,
            op: TransferOp::PostPending,
            pending_id: Some(pending_id),
            timeout_secs: None,
            reference: None,
        }
    }

    /// Void a pending transfer
    pub fn void(pending_id: TransferId, amount_hint: Money, kind: TransferKind) -> Self {
        Self {
            op: TransferOp::VoidPending,
            ..Self::post(pending_id, amount_hint, kind)
        }
    }

    /// Set an explicit identifier
    pub fn with_id(mut self, id: TransferId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set a reservation timeout (pending operations)
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the caller tag
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Per-entry transfer creation failure
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateTransferError {
    /// A transfer with the supplied id already exists
    #[error("transfer exists")]
    Exists,

    /// Debit or credit account does not exist
    #[error("account not found")]
    AccountNotFound,

    /// Accounts and amount are not all in the same currency book
    #[error("ledger mismatch")]
    LedgerMismatch,

    /// Amount is zero or negative
    #[error("amount zero")]
    AmountZero,

    /// Post/void without a resolvable pending reference
    #[error("pending transfer not found")]
    PendingNotFound,

    /// Referenced pending transfer already reached a terminal state
    #[error("pending transfer already resolved")]
    PendingAlreadyResolved,

    /// Post/void amount differs from the reserved amount
    #[error("pending amount mismatch")]
    PendingAmountMismatch,

    /// Debit would exceed the account's available balance
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Referenced pending transfer expired before this operation
    #[error("pending transfer timed out")]
    Timeout,
}

/// Per-entry result: the assigned id or the reason code
pub type CreateTransferResult = std::result::Result<TransferId, CreateTransferError>;
