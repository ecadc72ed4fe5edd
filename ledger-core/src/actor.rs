//! Actor-based concurrency for the ledger engine
//!
//! A single writer task owns all account and transfer state:
//! - callers submit batches through a cloneable [`LedgerHandle`]
//! - entries apply in arrival order (FIFO within and across batches)
//! - one applied batch commits as one storage write, then its events are
//!   handed to the CDC publisher
//!
//! Reads also pass through the actor so they always observe the last
//! committed batch.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use crate::metrics::{LEDGER_ACCOUNTS_TOTAL, LEDGER_TRANSFERS_TOTAL};
use crate::ops::{
    CreateAccountError, CreateAccountResult, CreateTransferError, CreateTransferResult, NewAccount,
    NewTransfer, TransferOp,
};
use crate::types::{
    Account, AccountId, AccountType, Currency, IdGenerator, Transfer, TransferEvent,
    TransferEventKind, TransferId, TransferState,
};
use crate::{Error, Result, Storage};

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Create a batch of accounts
    CreateAccounts {
        /// Entries, processed in order
        batch: Vec<NewAccount>,
        /// Per-entry results (outer error = storage failure)
        response: oneshot::Sender<Result<Vec<CreateAccountResult>>>,
    },

    /// Create a batch of transfers
    CreateTransfers {
        /// Entries, processed in order
        batch: Vec<NewTransfer>,
        /// Per-entry results (outer error = storage failure)
        response: oneshot::Sender<Result<Vec<CreateTransferResult>>>,
    },

    /// Point-read accounts; missing ids yield `None`
    LookupAccounts {
        /// Ids to read
        ids: Vec<AccountId>,
        /// One slot per requested id
        response: oneshot::Sender<Result<Vec<Option<Account>>>>,
    },

    /// Point-read transfers; missing ids yield `None`
    LookupTransfers {
        /// Ids to read
        ids: Vec<TransferId>,
        /// One slot per requested id
        response: oneshot::Sender<Result<Vec<Option<Transfer>>>>,
    },

    /// Shutdown the actor
    Shutdown,
}

/// Copy-on-write staging area for one batch
///
/// Entries mutate staged clones; main state is only touched after the
/// storage commit succeeds, so a failed commit leaves the engine unchanged.
struct Staging<'a> {
    base_accounts: &'a HashMap<AccountId, Account>,
    base_transfers: &'a HashMap<TransferId, Transfer>,
    accounts: HashMap<AccountId, Account>,
    transfers: HashMap<TransferId, Transfer>,
    events: Vec<TransferEvent>,
}

impl<'a> Staging<'a> {
    fn new(
        base_accounts: &'a HashMap<AccountId, Account>,
        base_transfers: &'a HashMap<TransferId, Transfer>,
    ) -> Self {
        Self {
            base_accounts,
            base_transfers,
            accounts: HashMap::new(),
            transfers: HashMap::new(),
            events: Vec::new(),
        }
    }

    fn account(&self, id: AccountId) -> Option<Account> {
        self.accounts
            .get(&id)
            .or_else(|| self.base_accounts.get(&id))
            .cloned()
    }

    fn transfer(&self, id: TransferId) -> Option<Transfer> {
        self.transfers
            .get(&id)
            .or_else(|| self.base_transfers.get(&id))
            .cloned()
    }

    fn contains_transfer(&self, id: TransferId) -> bool {
        self.transfers.contains_key(&id) || self.base_transfers.contains_key(&id)
    }

    fn put_account(&mut self, account: Account) {
        self.accounts.insert(account.id, account);
    }

    fn put_transfer(&mut self, transfer: Transfer) {
        self.transfers.insert(transfer.id, transfer);
    }

    /// Record one lifecycle event with commit-time account snapshots
    fn emit(&mut self, kind: TransferEventKind, transfer: &Transfer, timestamp: DateTime<Utc>) {
        // Accounts were staged by the caller just before emitting.
        let debit_account = self
            .account(transfer.debit_account_id)
            .expect("debit account staged before event emission");
        let credit_account = self
            .account(transfer.credit_account_id)
            .expect("credit account staged before event emission");

        self.events.push(TransferEvent {
            kind,
            timestamp,
            transfer: transfer.clone(),
            debit_account,
            credit_account,
        });
    }

    /// Release the reservation of an expired pending transfer and mark it
    /// terminal. Invariant: `pending.state == TwoPhasePending`.
    fn expire(&mut self, mut pending: Transfer, now: DateTime<Utc>) {
        let amount = pending.amount.minor_units() as u128;

        let mut debit = self
            .account(pending.debit_account_id)
            .expect("pending transfer references existing debit account");
        let mut credit = self
            .account(pending.credit_account_id)
            .expect("pending transfer references existing credit account");

        debit.debits_pending = debit
            .debits_pending
            .checked_sub(amount)
            .expect("pending debit counter underflow");
        credit.credits_pending = credit
            .credits_pending
            .checked_sub(amount)
            .expect("pending credit counter underflow");

        self.put_account(debit);
        self.put_account(credit);

        pending.state = TransferState::TwoPhaseExpired;
        self.put_transfer(pending.clone());
        self.emit(TransferEventKind::TwoPhaseExpired, &pending, now);
    }
}

/// Actor that owns ledger state and processes batches
pub struct LedgerActor {
    storage: Arc<Storage>,
    mailbox: mpsc::Receiver<LedgerMessage>,
    accounts: HashMap<AccountId, Account>,
    transfers: HashMap<TransferId, Transfer>,
    id_gen: IdGenerator,
    event_tx: mpsc::Sender<TransferEvent>,
}

impl LedgerActor {
    /// Create a new actor over warmed-up state
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        accounts: Vec<Account>,
        transfers: Vec<Transfer>,
        event_tx: mpsc::Sender<TransferEvent>,
    ) -> Self {
        Self {
            storage,
            mailbox,
            accounts: accounts.into_iter().map(|a| (a.id, a)).collect(),
            transfers: transfers.into_iter().map(|t| (t.id, t)).collect(),
            id_gen: IdGenerator::new(),
            event_tx,
        }
    }

    /// Run the actor event loop until shutdown or mailbox close
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                LedgerMessage::CreateAccounts { batch, response } => {
                    let result = self.create_accounts(batch);
                    let _ = response.send(result);
                }
                LedgerMessage::CreateTransfers { batch, response } => {
                    let (result, events) = self.create_transfers(batch);
                    let _ = response.send(result);
                    self.publish_events(events).await;
                }
                LedgerMessage::LookupAccounts { ids, response } => {
                    let result = ids.iter().map(|id| self.accounts.get(id).cloned()).collect();
                    let _ = response.send(Ok(result));
                }
                LedgerMessage::LookupTransfers { ids, response } => {
                    let (result, events) = self.lookup_transfers(ids);
                    let _ = response.send(result);
                    self.publish_events(events).await;
                }
            }
        }
        tracing::info!("ledger actor stopped");
    }

    /// Hand post-commit events to the CDC publisher
    async fn publish_events(&self, events: Vec<TransferEvent>) {
        for event in events {
            if self.event_tx.send(event).await.is_err() {
                // No consumer attached; events are observational only here.
                tracing::debug!("event channel closed, dropping transfer events");
                return;
            }
        }
    }

    fn create_accounts(&mut self, batch: Vec<NewAccount>) -> Result<Vec<CreateAccountResult>> {
        let now = Utc::now();
        let mut staged: HashMap<AccountId, Account> = HashMap::new();
        let mut results = Vec::with_capacity(batch.len());

        for entry in batch {
            results.push(self.create_account_entry(entry, now, &mut staged));
        }

        let dirty: Vec<Account> = staged.values().cloned().collect();
        self.storage.commit(&dirty, &[])?;
        self.accounts.extend(staged);

        for result in &results {
            let status = if result.is_ok() { "ok" } else { "failed" };
            LEDGER_ACCOUNTS_TOTAL.with_label_values(&[status]).inc();
        }

        Ok(results)
    }

    fn create_account_entry(
        &self,
        entry: NewAccount,
        now: DateTime<Utc>,
        staged: &mut HashMap<AccountId, Account>,
    ) -> CreateAccountResult {
        let currency =
            Currency::from_ledger_code(entry.ledger).ok_or(CreateAccountError::LedgerMismatch)?;
        let account_type =
            AccountType::from_code(entry.code).ok_or(CreateAccountError::CodeInvalid)?;
        if entry.flags != 0 {
            return Err(CreateAccountError::FlagsInvalid);
        }

        let id = match entry.id {
            Some(id) => {
                if self.accounts.contains_key(&id) || staged.contains_key(&id) {
                    return Err(CreateAccountError::Exists);
                }
                id
            }
            None => AccountId::new(self.id_gen.next()),
        };

        staged.insert(
            id,
            Account {
                id,
                currency,
                account_type,
                debits_posted: 0,
                credits_posted: 0,
                debits_pending: 0,
                credits_pending: 0,
                user_tag: entry.user_tag,
                created_at: now,
            },
        );

        Ok(id)
    }

    fn create_transfers(
        &mut self,
        batch: Vec<NewTransfer>,
    ) -> (Result<Vec<CreateTransferResult>>, Vec<TransferEvent>) {
        // Wall clock sampled once per batch; expiry checks inside the batch
        // all see the same instant.
        let now = Utc::now();

        let mut staging = Staging::new(&self.accounts, &self.transfers);
        let mut results = Vec::with_capacity(batch.len());

        for entry in batch {
            let result = self.apply_transfer_entry(entry, now, &mut staging);
            results.push(result);
        }

        let dirty_accounts: Vec<Account> = staging.accounts.values().cloned().collect();
        let dirty_transfers: Vec<Transfer> = staging.transfers.values().cloned().collect();
        let events = staging.events;

        if let Err(e) = self.storage.commit(&dirty_accounts, &dirty_transfers) {
            return (Err(e), Vec::new());
        }

        for account in dirty_accounts {
            self.accounts.insert(account.id, account);
        }
        for transfer in dirty_transfers {
            self.transfers.insert(transfer.id, transfer);
        }

        for result in &results {
            let status = if result.is_ok() { "ok" } else { "failed" };
            LEDGER_TRANSFERS_TOTAL.with_label_values(&[status]).inc();
        }

        (Ok(results), events)
    }

    fn apply_transfer_entry(
        &self,
        entry: NewTransfer,
        now: DateTime<Utc>,
        staging: &mut Staging<'_>,
    ) -> CreateTransferResult {
        match entry.op {
            TransferOp::SinglePhase | TransferOp::Pending => {
                self.apply_movement(entry, now, staging)
            }
            TransferOp::PostPending | TransferOp::VoidPending => {
                self.apply_resolution(entry, now, staging)
            }
        }
    }

    /// Single-phase post or two-phase reservation
    fn apply_movement(
        &self,
        entry: NewTransfer,
        now: DateTime<Utc>,
        staging: &mut Staging<'_>,
    ) -> CreateTransferResult {
        let id = self.allocate_transfer_id(entry.id, staging)?;

        if !entry.amount.is_positive() {
            return Err(CreateTransferError::AmountZero);
        }

        let mut debit = staging
            .account(entry.debit_account_id)
            .ok_or(CreateTransferError::AccountNotFound)?;
        let mut credit = staging
            .account(entry.credit_account_id)
            .ok_or(CreateTransferError::AccountNotFound)?;

        if debit.currency != credit.currency || debit.currency != entry.amount.currency() {
            return Err(CreateTransferError::LedgerMismatch);
        }

        let amount = entry.amount.minor_units() as u128;
        if debit.account_type.enforces_funds() && (amount as i128) > debit.available() {
            return Err(CreateTransferError::InsufficientFunds);
        }

        let (state, kind_event, timeout_at) = match entry.op {
            TransferOp::SinglePhase => {
                debit.debits_posted += amount;
                credit.credits_posted += amount;
                (TransferState::SinglePhase, TransferEventKind::SinglePhase, None)
            }
            TransferOp::Pending => {
                debit.debits_pending += amount;
                credit.credits_pending += amount;
                let deadline = entry
                    .timeout_secs
                    .map(|secs| now + Duration::seconds(secs as i64));
                (
                    TransferState::TwoPhasePending,
                    TransferEventKind::TwoPhasePending,
                    deadline,
                )
            }
            _ => unreachable!("resolutions handled in apply_resolution"),
        };

        staging.put_account(debit);
        staging.put_account(credit);

        let transfer = Transfer {
            id,
            debit_account_id: entry.debit_account_id,
            credit_account_id: entry.credit_account_id,
            amount: entry.amount,
            kind: entry.kind,
            state,
            pending_id: None,
            timeout_at,
            reference: entry.reference,
            created_at: now,
        };
        staging.put_transfer(transfer.clone());
        staging.emit(kind_event, &transfer, now);

        Ok(id)
    }

    /// Post or void of a referenced pending transfer
    fn apply_resolution(
        &self,
        entry: NewTransfer,
        now: DateTime<Utc>,
        staging: &mut Staging<'_>,
    ) -> CreateTransferResult {
        let id = self.allocate_transfer_id(entry.id, staging)?;

        let pending_id = entry.pending_id.ok_or(CreateTransferError::PendingNotFound)?;
        let pending = staging
            .transfer(pending_id)
            .ok_or(CreateTransferError::PendingNotFound)?;

        // Expiration is materialized lazily on first touch.
        if pending.is_expired(now) {
            staging.expire(pending, now);
            return Err(CreateTransferError::Timeout);
        }

        if pending.state != TransferState::TwoPhasePending {
            return Err(CreateTransferError::PendingAlreadyResolved);
        }

        if !entry.amount.is_zero() {
            if entry.amount.currency() != pending.amount.currency() {
                return Err(CreateTransferError::LedgerMismatch);
            }
            if entry.amount != pending.amount {
                return Err(CreateTransferError::PendingAmountMismatch);
            }
        }

        let amount = pending.amount.minor_units() as u128;

        let mut debit = staging
            .account(pending.debit_account_id)
            .expect("pending transfer references existing debit account");
        let mut credit = staging
            .account(pending.credit_account_id)
            .expect("pending transfer references existing credit account");

        debit.debits_pending = debit
            .debits_pending
            .checked_sub(amount)
            .expect("pending debit counter underflow");
        credit.credits_pending = credit
            .credits_pending
            .checked_sub(amount)
            .expect("pending credit counter underflow");

        let (state, event_kind) = match entry.op {
            TransferOp::PostPending => {
                debit.debits_posted += amount;
                credit.credits_posted += amount;
                (TransferState::TwoPhasePosted, TransferEventKind::TwoPhasePosted)
            }
            TransferOp::VoidPending => {
                (TransferState::TwoPhaseVoided, TransferEventKind::TwoPhaseVoided)
            }
            _ => unreachable!("movements handled in apply_movement"),
        };

        staging.put_account(debit);
        staging.put_account(credit);

        // Mark the pending transfer terminal.
        let mut resolved_pending = pending.clone();
        resolved_pending.state = state;
        staging.put_transfer(resolved_pending);

        let resolution = Transfer {
            id,
            debit_account_id: pending.debit_account_id,
            credit_account_id: pending.credit_account_id,
            amount: pending.amount,
            kind: entry.kind,
            state,
            pending_id: Some(pending_id),
            timeout_at: None,
            reference: entry.reference,
            created_at: now,
        };
        staging.put_transfer(resolution.clone());
        staging.emit(event_kind, &resolution, now);

        Ok(id)
    }

    fn allocate_transfer_id(
        &self,
        supplied: Option<TransferId>,
        staging: &Staging<'_>,
    ) -> std::result::Result<TransferId, CreateTransferError> {
        match supplied {
            Some(id) => {
                if staging.contains_transfer(id) {
                    return Err(CreateTransferError::Exists);
                }
                Ok(id)
            }
            None => Ok(TransferId::new(self.id_gen.next())),
        }
    }

    /// Point reads; expired pending transfers are materialized on touch
    fn lookup_transfers(
        &mut self,
        ids: Vec<TransferId>,
    ) -> (Result<Vec<Option<Transfer>>>, Vec<TransferEvent>) {
        let now = Utc::now();
        let mut staging = Staging::new(&self.accounts, &self.transfers);

        for id in &ids {
            if let Some(transfer) = staging.transfer(*id) {
                if transfer.is_expired(now) {
                    staging.expire(transfer, now);
                }
            }
        }

        let dirty_accounts: Vec<Account> = staging.accounts.values().cloned().collect();
        let dirty_transfers: Vec<Transfer> = staging.transfers.values().cloned().collect();
        let events = staging.events;

        if !dirty_accounts.is_empty() || !dirty_transfers.is_empty() {
            if let Err(e) = self.storage.commit(&dirty_accounts, &dirty_transfers) {
                return (Err(e), Vec::new());
            }
            for account in dirty_accounts {
                self.accounts.insert(account.id, account);
            }
            for transfer in dirty_transfers {
                self.transfers.insert(transfer.id, transfer);
            }
        }

        let result = ids.iter().map(|id| self.transfers.get(id).cloned()).collect();
        (Ok(result), events)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create a new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("response channel closed".to_string()))?
    }

    /// Create a batch of accounts
    pub async fn create_accounts(
        &self,
        batch: Vec<NewAccount>,
    ) -> Result<Vec<CreateAccountResult>> {
        self.request(|response| LedgerMessage::CreateAccounts { batch, response })
            .await
    }

    /// Create a batch of transfers
    pub async fn create_transfers(
        &self,
        batch: Vec<NewTransfer>,
    ) -> Result<Vec<CreateTransferResult>> {
        self.request(|response| LedgerMessage::CreateTransfers { batch, response })
            .await
    }

    /// Point-read accounts
    pub async fn lookup_accounts(&self, ids: Vec<AccountId>) -> Result<Vec<Option<Account>>> {
        self.request(|response| LedgerMessage::LookupAccounts { ids, response })
            .await
    }

    /// Point-read transfers
    pub async fn lookup_transfers(&self, ids: Vec<TransferId>) -> Result<Vec<Option<Transfer>>> {
        self.request(|response| LedgerMessage::LookupTransfers { ids, response })
            .await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("actor mailbox closed".to_string()))
    }
}

/// Spawn the ledger actor over warmed-up state
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    accounts: Vec<Account>,
    transfers: Vec<Transfer>,
    mailbox_capacity: usize,
    event_tx: mpsc::Sender<TransferEvent>,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity);
    let actor = LedgerActor::new(storage, rx, accounts, transfers, event_tx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
