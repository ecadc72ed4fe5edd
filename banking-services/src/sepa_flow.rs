//! SEPA message flow into the ledger
//!
//! Accepted messages become single-phase ledger transfers against the
//! currency-specific suspense accounts (outgoing: customer account to
//! out-suspense; incoming: in-suspense to customer account) plus an
//! external-transaction record whose status follows the SEPA transfer
//! state machine.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use ledger_core::actor::LedgerHandle;
use ledger_core::{AccountId, NewTransfer, TransferId, TransferKind};
use metadata_store::{
    ExternalBankInfo, ExternalTransaction, ExternalTransactionRepository,
    ExternalTransactionStatus, ExternalTransactionType,
};
use sepa_adapter::{SepaAdapter, SepaError, SepaMessage, SepaResponse, SepaTransferState};

use crate::error::{Result, ServiceError};
use crate::system_accounts::SystemAccountRegistry;

/// Bridges the SEPA adapter and the ledger
pub struct SepaFlow {
    adapter: Arc<SepaAdapter>,
    ledger: LedgerHandle,
    registry: Arc<SystemAccountRegistry>,
    external: Arc<dyn ExternalTransactionRepository>,
}

impl SepaFlow {
    /// Create the flow over its collaborators
    pub fn new(
        adapter: Arc<SepaAdapter>,
        ledger: LedgerHandle,
        registry: Arc<SystemAccountRegistry>,
        external: Arc<dyn ExternalTransactionRepository>,
    ) -> Self {
        Self {
            adapter,
            ledger,
            registry,
            external,
        }
    }

    /// Submit an outgoing message for a customer account
    ///
    /// The debtor account must cover the amount before the message reaches
    /// the network; an uncovered message is rejected with the retryable
    /// `InsufficientFunds` code and no state change anywhere.
    pub async fn send_outgoing(
        &self,
        account_id: AccountId,
        message: SepaMessage,
    ) -> Result<SepaResponse> {
        let currency = message.amount.currency();

        let account = self
            .ledger
            .lookup_accounts(vec![account_id])
            .await?
            .pop()
            .flatten()
            .ok_or_else(|| ServiceError::NotFound(account_id.to_string()))?;

        if account.currency != currency {
            return Err(ServiceError::Transfer(
                ledger_core::CreateTransferError::LedgerMismatch,
            ));
        }
        if account.available() < message.amount.minor_units() {
            return Ok(SepaResponse::rejected(SepaError::InsufficientFunds));
        }

        let response = self.adapter.process(message.clone()).await;
        let Some(transaction_id) = response.sepa_transaction_id.clone() else {
            return Ok(response);
        };

        let suspense = self
            .registry
            .sepa_out_suspense(currency)
            .ok_or_else(|| ServiceError::SystemAccountMissing(
                SystemAccountRegistry::sepa_out_key(currency),
            ))?;

        let transfer_id = self
            .post_leg(account_id, suspense, &message, &transaction_id, TransferKind::SepaOutgoing)
            .await?;

        self.record_external(
            &transaction_id,
            account_id,
            transfer_id,
            ExternalTransactionType::SepaOutgoing,
            &message,
        )
        .await?;

        info!(
            transaction_id = %transaction_id,
            account = %account_id,
            amount = %message.amount,
            "outgoing sepa transfer posted to suspense"
        );

        Ok(response)
    }

    /// Apply an incoming message for a customer account
    pub async fn receive_incoming(
        &self,
        account_id: AccountId,
        message: SepaMessage,
    ) -> Result<SepaResponse> {
        let currency = message.amount.currency();

        let response = self.adapter.process(message.clone()).await;
        let Some(transaction_id) = response.sepa_transaction_id.clone() else {
            return Ok(response);
        };

        let suspense = self
            .registry
            .sepa_in_suspense(currency)
            .ok_or_else(|| ServiceError::SystemAccountMissing(
                SystemAccountRegistry::sepa_in_key(currency),
            ))?;

        let transfer_id = self
            .post_leg(suspense, account_id, &message, &transaction_id, TransferKind::SepaIncoming)
            .await?;

        self.record_external(
            &transaction_id,
            account_id,
            transfer_id,
            ExternalTransactionType::SepaIncoming,
            &message,
        )
        .await?;

        Ok(response)
    }

    /// Propagate the adapter's settlement state into the external record
    pub async fn sync_settlement(&self, transaction_id: &str) -> Result<ExternalTransactionStatus> {
        let record = self
            .external
            .get(transaction_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(transaction_id.to_string()))?;

        let transfer = self
            .adapter
            .transfer(transaction_id)
            .ok_or_else(|| ServiceError::NotFound(transaction_id.to_string()))?;

        let status = match transfer.state {
            SepaTransferState::Pending => ExternalTransactionStatus::Pending,
            SepaTransferState::Settled => ExternalTransactionStatus::Settled,
            SepaTransferState::Failed => ExternalTransactionStatus::Failed,
        };

        if status != record.status {
            self.external
                .update_status(transaction_id, status, None)
                .await?;
        }

        Ok(status)
    }

    async fn post_leg(
        &self,
        debit: AccountId,
        credit: AccountId,
        message: &SepaMessage,
        transaction_id: &str,
        kind: TransferKind,
    ) -> Result<TransferId> {
        let spec = NewTransfer::single_phase(debit, credit, message.amount, kind)
            .with_reference(transaction_id);

        let results = self.ledger.create_transfers(vec![spec]).await?;
        results[0].map_err(ServiceError::Transfer)
    }

    async fn record_external(
        &self,
        transaction_id: &str,
        account_id: AccountId,
        transfer_id: TransferId,
        transaction_type: ExternalTransactionType,
        message: &SepaMessage,
    ) -> Result<()> {
        let now = Utc::now();
        self.external
            .insert(ExternalTransaction {
                external_transaction_id: transaction_id.to_string(),
                account_id,
                transfer_id: Some(transfer_id),
                transaction_type,
                amount: message.amount,
                status: ExternalTransactionStatus::Pending,
                external_bank_info: ExternalBankInfo {
                    debtor_iban: message.debtor_iban.clone(),
                    creditor_iban: message.creditor_iban.clone(),
                    debtor_bic: message.debtor_bic.clone(),
                    creditor_bic: message.creditor_bic.clone(),
                },
                description: message.description.clone(),
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(())
    }
}
