//! Core types for the ledger engine
//!
//! All types are designed for:
//! - Exact arithmetic (integer minor units, no floats)
//! - Deterministic serialization (bincode on disk, decimal strings on JSON
//!   boundaries so 128-bit values never lose precision)
//! - Memory safety (no unsafe code)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Serde helpers encoding 128-bit integers as decimal strings.
///
/// JSON numbers cannot carry 128 bits without precision loss, so every
/// boundary serializes these fields as strings.
pub(crate) mod u128_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Same as [`u128_string`] for signed amounts.
pub(crate) mod i128_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// ISO 4217 currency code
///
/// The set is closed: every account and transfer is scoped to exactly one of
/// these currency books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    /// US Dollar
    USD,
    /// Euro
    EUR,
    /// British Pound
    GBP,
    /// Norwegian Krone
    NOK,
    /// Swedish Krona
    SEK,
    /// Danish Krone
    DKK,
}

impl Currency {
    /// All configured currencies
    pub const ALL: [Currency; 6] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::NOK,
        Currency::SEK,
        Currency::DKK,
    ];

    /// ISO 4217 alphabetic code
    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::NOK => "NOK",
            Currency::SEK => "SEK",
            Currency::DKK => "DKK",
        }
    }

    /// Ledger code: the ISO 4217 numeric code identifying this currency book
    pub fn ledger_code(&self) -> u32 {
        match self {
            Currency::USD => 840,
            Currency::EUR => 978,
            Currency::GBP => 826,
            Currency::NOK => 578,
            Currency::SEK => 752,
            Currency::DKK => 208,
        }
    }

    /// Minor-unit exponent (all configured currencies use 2)
    pub fn exponent(&self) -> u32 {
        2
    }

    /// Parse from alphabetic code
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "NOK" => Some(Currency::NOK),
            "SEK" => Some(Currency::SEK),
            "DKK" => Some(Currency::DKK),
            _ => None,
        }
    }

    /// Resolve a ledger code back to its currency
    pub fn from_ledger_code(code: u32) -> Option<Self> {
        Currency::ALL.iter().copied().find(|c| c.ledger_code() == code)
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Exact money: integer minor units plus currency
///
/// Signed 128-bit minor units are sufficient for any single-currency balance.
/// Arithmetic is checked and rejects mixed-currency operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g. cents), encoded as a decimal string on
    /// JSON boundaries
    #[serde(with = "i128_string")]
    minor_units: i128,

    /// Currency of the amount
    currency: Currency,
}

impl Money {
    /// Create from minor units
    pub fn new(minor_units: i128, currency: Currency) -> Self {
        Self {
            minor_units,
            currency,
        }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Amount in minor units
    pub fn minor_units(&self) -> i128 {
        self.minor_units
    }

    /// Currency of the amount
    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// True if strictly greater than zero
    pub fn is_positive(&self) -> bool {
        self.minor_units > 0
    }

    /// True if exactly zero
    pub fn is_zero(&self) -> bool {
        self.minor_units == 0
    }

    /// Absolute value
    pub fn abs(&self) -> Self {
        Self::new(self.minor_units.abs(), self.currency)
    }

    fn require_same_currency(&self, other: &Money) -> Result<()> {
        if self.currency != other.currency {
            return Err(Error::CurrencyMismatch {
                expected: self.currency,
                found: other.currency,
            });
        }
        Ok(())
    }

    /// Checked addition; fails on mixed currencies or overflow
    pub fn checked_add(&self, other: &Money) -> Result<Money> {
        self.require_same_currency(other)?;
        self.minor_units
            .checked_add(other.minor_units)
            .map(|units| Money::new(units, self.currency))
            .ok_or(Error::AmountOverflow)
    }

    /// Checked subtraction; fails on mixed currencies or overflow
    pub fn checked_sub(&self, other: &Money) -> Result<Money> {
        self.require_same_currency(other)?;
        self.minor_units
            .checked_sub(other.minor_units)
            .map(|units| Money::new(units, self.currency))
            .ok_or(Error::AmountOverflow)
    }

    /// Multiply by a scaled integer factor: `amount * factor / 10^scale`,
    /// rounded half away from zero.
    pub fn checked_mul_scaled(&self, factor: i128, scale: u32) -> Result<Money> {
        let divisor = 10i128
            .checked_pow(scale)
            .ok_or(Error::AmountOverflow)?;
        let product = self
            .minor_units
            .checked_mul(factor)
            .ok_or(Error::AmountOverflow)?;

        let quotient = product / divisor;
        let remainder = product % divisor;
        let rounded = if remainder.abs() * 2 >= divisor {
            quotient + remainder.signum()
        } else {
            quotient
        };

        Ok(Money::new(rounded, self.currency))
    }

    /// Compare amounts; fails on mixed currencies
    pub fn compare(&self, other: &Money) -> Result<Ordering> {
        self.require_same_currency(other)?;
        Ok(self.minor_units.cmp(&other.minor_units))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let divisor = 10i128.pow(self.currency.exponent());
        let sign = if self.minor_units < 0 { "-" } else { "" };
        let abs = self.minor_units.unsigned_abs();
        let units = abs / divisor.unsigned_abs();
        let frac = abs % divisor.unsigned_abs();
        write!(
            f,
            "{}{}.{:0width$} {}",
            sign,
            units,
            frac,
            self.currency,
            width = self.currency.exponent() as usize
        )
    }
}

impl FromStr for Money {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAmount(s.to_string());

        let (number, code) = s.trim().split_once(' ').ok_or_else(invalid)?;
        let currency = Currency::parse(code.trim()).ok_or_else(invalid)?;
        let exponent = currency.exponent() as usize;

        let (sign, digits) = match number.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, number),
        };

        let (units, frac) = match digits.split_once('.') {
            Some((u, f)) => (u, f),
            None => (digits, ""),
        };
        if frac.len() > exponent || units.is_empty() {
            return Err(invalid());
        }

        let mut padded = frac.to_string();
        while padded.len() < exponent {
            padded.push('0');
        }

        let units: i128 = units.parse().map_err(|_| invalid())?;
        let frac: i128 = if padded.is_empty() {
            0
        } else {
            padded.parse().map_err(|_| invalid())?
        };

        let minor = units
            .checked_mul(10i128.pow(currency.exponent()))
            .and_then(|u| u.checked_add(frac))
            .ok_or(Error::AmountOverflow)?;

        Ok(Money::new(sign * minor, currency))
    }
}

/// Account identifier: opaque 128-bit value, textual form is decimal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(#[serde(with = "u128_string")] u128);

impl AccountId {
    /// Create from a raw 128-bit value
    pub fn new(value: u128) -> Self {
        Self(value)
    }

    /// Raw 128-bit value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse()
            .map(AccountId)
            .map_err(|_| Error::InvalidIdentifier(s.to_string()))
    }
}

/// Transfer identifier: opaque 128-bit value, textual form is decimal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransferId(#[serde(with = "u128_string")] u128);

impl TransferId {
    /// Create from a raw 128-bit value
    pub fn new(value: u128) -> Self {
        Self(value)
    }

    /// Raw 128-bit value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TransferId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse()
            .map(TransferId)
            .map_err(|_| Error::InvalidIdentifier(s.to_string()))
    }
}

/// Monotonic 128-bit identifier generator
///
/// Layout: `unix_millis << 16 | sequence`. Strictly increasing across calls,
/// including bursts inside a single millisecond (the sequence carries into
/// the millisecond field on overflow).
#[derive(Debug)]
pub struct IdGenerator {
    state: parking_lot::Mutex<(u64, u16)>,
}

impl IdGenerator {
    /// Create a generator seeded from the current clock
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new((0, 0)),
        }
    }

    /// Allocate the next identifier
    pub fn next(&self) -> u128 {
        let now_millis = Utc::now().timestamp_millis().max(0) as u64;
        let mut state = self.state.lock();
        let (last_millis, last_seq) = *state;

        let (millis, seq) = if now_millis > last_millis {
            (now_millis, 0)
        } else if last_seq < u16::MAX {
            (last_millis, last_seq + 1)
        } else {
            (last_millis + 1, 0)
        };

        *state = (millis, seq);
        ((millis as u128) << 16) | seq as u128
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Customer identifier: 1-50 chars from `[A-Za-z0-9_-]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CustomerId(String);

impl CustomerId {
    /// Maximum accepted length
    pub const MAX_LEN: usize = 50;

    /// Validate and construct
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= Self::MAX_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidCustomerId(id));
        }
        Ok(Self(id))
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for CustomerId {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        CustomerId::new(s).map_err(serde::de::Error::custom)
    }
}

/// Account type code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    /// Customer deposit account
    Deposit,
    /// Loan principal account
    Loan,
    /// Customer credit account
    Credit,
    /// System equity account (funding leg)
    Equity,
    /// Per-currency suspense account for in-flight external funds
    Suspense,
}

impl AccountType {
    /// Numeric type code as stored on the account record
    pub fn code(&self) -> u16 {
        match self {
            AccountType::Deposit => 1,
            AccountType::Loan => 2,
            AccountType::Credit => 3,
            AccountType::Equity => 4,
            AccountType::Suspense => 5,
        }
    }

    /// Resolve a numeric type code
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(AccountType::Deposit),
            2 => Some(AccountType::Loan),
            3 => Some(AccountType::Credit),
            4 => Some(AccountType::Equity),
            5 => Some(AccountType::Suspense),
            _ => None,
        }
    }

    /// Whether debits from this account are capped by its available balance.
    /// Equity and suspense accounts are the system funding legs and may go
    /// negative.
    pub fn enforces_funds(&self) -> bool {
        matches!(
            self,
            AccountType::Deposit | AccountType::Loan | AccountType::Credit
        )
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountType::Deposit => "DEPOSIT",
            AccountType::Loan => "LOAN",
            AccountType::Credit => "CREDIT",
            AccountType::Equity => "EQUITY",
            AccountType::Suspense => "SUSPENSE",
        };
        write!(f, "{}", s)
    }
}

/// Ledger account with posted and pending running totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub id: AccountId,

    /// Currency book this account lives in
    pub currency: Currency,

    /// Account type
    pub account_type: AccountType,

    /// Total posted debits (monotonic)
    #[serde(with = "u128_string")]
    pub debits_posted: u128,

    /// Total posted credits (monotonic)
    #[serde(with = "u128_string")]
    pub credits_posted: u128,

    /// Reserved debits from unresolved two-phase transfers
    #[serde(with = "u128_string")]
    pub debits_pending: u128,

    /// Reserved credits from unresolved two-phase transfers
    #[serde(with = "u128_string")]
    pub credits_pending: u128,

    /// Optional caller tag
    pub user_tag: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Balance: `credits_posted - debits_posted`
    pub fn balance(&self) -> i128 {
        self.credits_posted as i128 - self.debits_posted as i128
    }

    /// Balance net of reserved debits
    pub fn available(&self) -> i128 {
        self.balance() - self.debits_pending as i128
    }

    /// Balance as typed money
    pub fn balance_money(&self) -> Money {
        Money::new(self.balance(), self.currency)
    }
}

/// Transfer state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    /// Posted at creation; no pending stage
    SinglePhase,
    /// Funds reserved, awaiting post or void
    TwoPhasePending,
    /// Reservation converted to posted movement
    TwoPhasePosted,
    /// Reservation released without posting
    TwoPhaseVoided,
    /// Reservation released because the timeout elapsed
    TwoPhaseExpired,
}

impl TransferState {
    /// True once no further transition is permitted
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferState::TwoPhasePending)
    }
}

/// Business meaning of a transfer
///
/// Typed replacement for free-form user-data slots; storage keeps it inside
/// the transfer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Ordinary customer-initiated transfer
    CustomerTransfer,
    /// Opening balance funded from the currency equity account
    InitialFunding,
    /// Loan principal funded into a loan account at creation
    LoanFunding,
    /// Loan balance paid out to a deposit account
    LoanDisbursement,
    /// Scheduled loan payment (deposit to loan)
    LoanPayment,
    /// Transfer settling an invoice; `reference` carries the invoice id
    InvoicePayment,
    /// Outgoing external payment against the out-suspense account
    SepaOutgoing,
    /// Incoming external payment against the in-suspense account
    SepaIncoming,
}

impl TransferKind {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::CustomerTransfer => "customer_transfer",
            TransferKind::InitialFunding => "initial_funding",
            TransferKind::LoanFunding => "loan_funding",
            TransferKind::LoanDisbursement => "loan_disbursement",
            TransferKind::LoanPayment => "loan_payment",
            TransferKind::InvoicePayment => "invoice_payment",
            TransferKind::SepaOutgoing => "sepa_outgoing",
            TransferKind::SepaIncoming => "sepa_incoming",
        }
    }
}

/// Double-entry transfer between two accounts in the same currency book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    /// Transfer identifier
    pub id: TransferId,

    /// Account debited
    pub debit_account_id: AccountId,

    /// Account credited
    pub credit_account_id: AccountId,

    /// Amount moved (always positive)
    pub amount: Money,

    /// Business meaning
    pub kind: TransferKind,

    /// Lifecycle state
    pub state: TransferState,

    /// Pending transfer resolved by this one (post/void records only)
    pub pending_id: Option<TransferId>,

    /// Absolute deadline for an unresolved pending transfer
    pub timeout_at: Option<DateTime<Utc>>,

    /// Optional caller tag (invoice id, external reference)
    pub reference: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Transfer {
    /// True if this is a pending transfer whose deadline has passed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == TransferState::TwoPhasePending
            && self.timeout_at.map_or(false, |deadline| now > deadline)
    }
}

/// Transfer lifecycle event kind, one per state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferEventKind {
    /// Single-phase transfer posted at creation
    SinglePhase,
    /// Two-phase reservation created
    TwoPhasePending,
    /// Two-phase reservation posted
    TwoPhasePosted,
    /// Two-phase reservation voided
    TwoPhaseVoided,
    /// Two-phase reservation expired
    TwoPhaseExpired,
}

impl TransferEventKind {
    /// All event kinds, in lifecycle order
    pub const ALL: [TransferEventKind; 5] = [
        TransferEventKind::SinglePhase,
        TransferEventKind::TwoPhasePending,
        TransferEventKind::TwoPhasePosted,
        TransferEventKind::TwoPhaseVoided,
        TransferEventKind::TwoPhaseExpired,
    ];

    /// Stable snake_case name; doubles as the routing key
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEventKind::SinglePhase => "single_phase",
            TransferEventKind::TwoPhasePending => "two_phase_pending",
            TransferEventKind::TwoPhasePosted => "two_phase_posted",
            TransferEventKind::TwoPhaseVoided => "two_phase_voided",
            TransferEventKind::TwoPhaseExpired => "two_phase_expired",
        }
    }

    /// Parse a routing key back to the kind
    pub fn parse(s: &str) -> Option<Self> {
        TransferEventKind::ALL.iter().copied().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for TransferEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event emitted after a batch commits: the full transfer record plus
/// commit-time snapshots of both involved accounts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferEvent {
    /// Transition that produced this event
    pub kind: TransferEventKind,

    /// Commit timestamp
    pub timestamp: DateTime<Utc>,

    /// Transfer record after the transition
    pub transfer: Transfer,

    /// Debit account snapshot at commit time
    pub debit_account: Account,

    /// Credit account snapshot at commit time
    pub credit_account: Account,
}

impl TransferEvent {
    /// Routing key for topic-exchange publication
    pub fn routing_key(&self) -> &'static str {
        self.kind.as_str()
    }
}
