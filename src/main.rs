//! Skyvault billing service binary.
//!
//! Wires configuration, the plan catalog, the per-region client registry,
//! the notification worker, and the axum surface. The ledger store and the
//! collaborator ports are bound to in-memory adapters here; deployments
//! supply their own implementations through `BillingAppState`.

use std::collections::BTreeMap;
use std::sync::Arc;

use secrecy::SecretString;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use skyvault_billing::adapters::http::{billing_router, BillingAppState};
use skyvault_billing::adapters::memory::{
    InMemoryStorageUsage, InMemorySubscriptionStore, InMemoryUserDirectory,
    RecordingOfferApplier,
};
use skyvault_billing::adapters::notify::{
    notification_channel, spawn_notification_worker, TracingSink,
};
use skyvault_billing::adapters::processor::{HttpProcessorClient, ProcessorAccountConfig};
use skyvault_billing::config::AppConfig;
use skyvault_billing::domain::billing::{
    PlanCatalog, SubscriptionReconciler, WebhookDispatcher, WebhookVerifier, DEFAULT_CATALOG,
};
use skyvault_billing::ports::{ClientRegistry, ProcessorClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;

    let catalog = Arc::new(match &config.payment.catalog_path {
        Some(path) => PlanCatalog::from_yaml(&std::fs::read_to_string(path)?)?,
        None => DEFAULT_CATALOG.clone(),
    });

    let mut clients: BTreeMap<_, Arc<dyn ProcessorClient>> = BTreeMap::new();
    let mut verifiers = BTreeMap::new();
    for (region, account) in &config.payment.accounts {
        clients.insert(
            *region,
            Arc::new(HttpProcessorClient::new(ProcessorAccountConfig::new(
                SecretString::new(account.api_key.clone()),
            ))) as Arc<dyn ProcessorClient>,
        );
        verifiers.insert(
            *region,
            WebhookVerifier::new(SecretString::new(account.webhook_secret.clone())),
        );
    }
    let registry = Arc::new(ClientRegistry::new(
        clients,
        config.payment.default_region,
    )?);

    let (queue, rx) = notification_channel();
    spawn_notification_worker(
        rx,
        vec![Arc::new(TracingSink) as Arc<dyn skyvault_billing::ports::NotificationSink>],
    );

    let store = Arc::new(InMemorySubscriptionStore::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    let usage = Arc::new(InMemoryStorageUsage::new());
    let offers = Arc::new(RecordingOfferApplier::new());

    let reconciler = Arc::new(SubscriptionReconciler::new(
        store.clone(),
        registry.clone(),
        catalog.clone(),
        users.clone(),
        usage.clone(),
        offers,
        Arc::new(queue),
    ));
    let dispatcher = Arc::new(WebhookDispatcher::new(
        verifiers,
        reconciler.clone(),
        store.clone(),
    ));

    let state = BillingAppState {
        store,
        registry,
        catalog,
        users,
        usage,
        reconciler,
        dispatcher,
        checkout_success_path: config.payment.checkout_success_path.clone(),
        checkout_cancel_path: config.payment.checkout_cancel_path.clone(),
    };

    let app = billing_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    tracing::info!(%addr, regions = ?config.payment.accounts.keys().collect::<Vec<_>>(), "billing service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
