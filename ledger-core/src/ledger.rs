//! Public ledger facade
//!
//! Ties storage and the single-writer actor into the engine API used by
//! every other component.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger};
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let mut ledger = Ledger::open(Config::default()).await?;
//!     let events = ledger.take_events().expect("events taken once");
//!
//!     // let results = ledger.create_accounts(vec![...]).await?;
//!     drop(events);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::actor::{spawn_ledger_actor, LedgerHandle};
use crate::ops::{CreateAccountResult, CreateTransferResult, NewAccount, NewTransfer};
use crate::types::{Account, AccountId, Transfer, TransferEvent, TransferId};
use crate::{Config, Result, Storage};

/// The ledger engine
pub struct Ledger {
    handle: LedgerHandle,
    events: Option<mpsc::Receiver<TransferEvent>>,
}

impl Ledger {
    /// Open the engine: warm state from storage and spawn the writer actor
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);

        let accounts = storage.load_accounts()?;
        let transfers = storage.load_transfers()?;
        tracing::info!(
            accounts = accounts.len(),
            transfers = transfers.len(),
            cluster_id = config.cluster_id,
            "ledger engine warmed up"
        );

        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let handle = spawn_ledger_actor(
            storage,
            accounts,
            transfers,
            config.mailbox_capacity,
            event_tx,
        );

        Ok(Self {
            handle,
            events: Some(event_rx),
        })
    }

    /// Take the post-commit event stream (exactly once)
    ///
    /// The CDC publisher owns this receiver; every committed state
    /// transition arrives here in commit order.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<TransferEvent>> {
        self.events.take()
    }

    /// Cloneable handle for concurrent callers
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Create a batch of accounts; entries succeed or fail independently
    pub async fn create_accounts(
        &self,
        batch: Vec<NewAccount>,
    ) -> Result<Vec<CreateAccountResult>> {
        self.handle.create_accounts(batch).await
    }

    /// Create a batch of transfers; entries succeed or fail independently
    pub async fn create_transfers(
        &self,
        batch: Vec<NewTransfer>,
    ) -> Result<Vec<CreateTransferResult>> {
        self.handle.create_transfers(batch).await
    }

    /// Point-read accounts; missing ids yield `None`
    pub async fn lookup_accounts(&self, ids: Vec<AccountId>) -> Result<Vec<Option<Account>>> {
        self.handle.lookup_accounts(ids).await
    }

    /// Point-read transfers; missing ids yield `None`
    pub async fn lookup_transfers(&self, ids: Vec<TransferId>) -> Result<Vec<Option<Transfer>>> {
        self.handle.lookup_transfers(ids).await
    }

    /// Read a single account
    pub async fn get_account(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.lookup_accounts(vec![id]).await?.pop().flatten())
    }

    /// Read a single transfer
    pub async fn get_transfer(&self, id: TransferId) -> Result<Option<Transfer>> {
        Ok(self.lookup_transfers(vec![id]).await?.pop().flatten())
    }

    /// Shutdown the engine
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await
    }
}
