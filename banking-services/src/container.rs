//! Service container: the single initialization root
//!
//! Builds the full component graph once at process start and passes it
//! explicitly to whoever needs it. No global mutable state beyond the
//! configuration snapshot and the logger; tests build their own container
//! over the in-process store and broker.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use cdc_bus::{
    spawn_consumer, spawn_publisher, AuditHandler, BusTransport, BusinessHandler, CdcConsumer,
    MemoryBroker, PublisherConfig,
};
use ledger_core::{Currency, Ledger};
use loan_service::{LoanService, PaymentScheduler};
use metadata_store::MemoryStore;
use sepa_adapter::SepaAdapter;

use crate::accounts::AccountService;
use crate::config::AppConfig;
use crate::error::{Result, ServiceError};
use crate::sepa_flow::SepaFlow;
use crate::system_accounts::SystemAccountRegistry;

/// The wired component graph
pub struct ServiceContainer {
    /// Ledger engine
    pub ledger: Ledger,

    /// In-process metadata store (stands in for the relational driver)
    pub store: Arc<MemoryStore>,

    /// In-process bus (stands in for the AMQP broker)
    pub broker: Arc<MemoryBroker>,

    /// CDC audit trail handler
    pub audit: Arc<AuditHandler>,

    /// CDC business handler (transfer history, invoices, monitors)
    pub business: Arc<BusinessHandler>,

    /// CDC consumer (exposes state and poison messages)
    pub consumer: Arc<CdcConsumer>,

    /// Customer account operations
    pub accounts: AccountService,

    /// Loan lifecycle operations
    pub loans: LoanService,

    /// Scheduled payment processor
    pub scheduler: Arc<PaymentScheduler>,

    /// SEPA adapter (simulated network)
    pub sepa: Arc<SepaAdapter>,

    /// SEPA-to-ledger flow
    pub sepa_flow: SepaFlow,

    /// System account registry
    pub registry: Arc<SystemAccountRegistry>,

    shutdown: watch::Sender<bool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl ServiceContainer {
    /// Build and start the full graph
    pub async fn init(config: AppConfig) -> Result<Self> {
        let mut ledger = Ledger::open(config.ledger.clone()).await?;
        let events = ledger
            .take_events()
            .ok_or_else(|| ServiceError::Config("ledger event stream already taken".to_string()))?;

        let registry = Arc::new(SystemAccountRegistry::load(&config.system_accounts_path)?);
        registry.ensure(&ledger.handle(), &Currency::ALL).await?;

        let store = Arc::new(MemoryStore::new());
        let broker = MemoryBroker::new();
        let (shutdown, _) = watch::channel(false);

        // Declare the durable queue before anything can publish, so events
        // emitted while the consumer task is still starting are not lost.
        broker
            .bind_queue(&config.cdc.exchange, &config.cdc.queue, &config.cdc.routing_keys)
            .await
            .map_err(|e| ServiceError::Config(format!("queue declaration failed: {}", e)))?;

        // CDC: publisher pump plus one consumer with both handlers.
        let publisher_config = PublisherConfig {
            exchange: config.cdc.exchange.clone(),
            ..Default::default()
        };
        let publisher_task = spawn_publisher(
            broker.clone(),
            publisher_config,
            events,
            shutdown.subscribe(),
        );

        let audit = Arc::new(AuditHandler::new());
        let business = Arc::new(BusinessHandler::new(store.clone()));
        let consumer = Arc::new(
            CdcConsumer::new(broker.clone(), config.cdc.clone())
                .register_wildcard(audit.clone())
                .register_wildcard(business.clone()),
        );
        let consumer_task = spawn_consumer(consumer.clone(), shutdown.subscribe());

        let accounts = AccountService::new(ledger.handle(), store.clone(), registry.clone());
        let loans = LoanService::new(
            ledger.handle(),
            store.clone(),
            store.clone(),
            registry.clone(),
            config.loan.clone(),
        );
        let scheduler = Arc::new(PaymentScheduler::new(
            ledger.handle(),
            store.clone(),
            store.clone(),
            config.loan.clone(),
        ));
        let scheduler_task = tokio::spawn(scheduler.clone().run(shutdown.subscribe()));

        let sepa = SepaAdapter::new(config.sepa.clone());
        let sepa_flow = SepaFlow::new(
            sepa.clone(),
            ledger.handle(),
            registry.clone(),
            store.clone(),
        );

        info!("service container initialized");

        Ok(Self {
            ledger,
            store,
            broker,
            audit,
            business,
            consumer,
            accounts,
            loans,
            scheduler,
            sepa,
            sepa_flow,
            registry,
            shutdown,
            tasks: vec![publisher_task, consumer_task, scheduler_task],
        })
    }

    /// Stop background tasks, drain in-flight work and shut the ledger down
    pub async fn shutdown(self) -> Result<()> {
        self.sepa.reset();
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        self.ledger.shutdown().await?;
        info!("service container stopped");
        Ok(())
    }
}
