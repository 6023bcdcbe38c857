//! Tenant router command line tool.
//!
//! Builds a router from flags and environment, then exercises it end to end:
//! two tenants write and read orders, and each is checked to be unable to see
//! the other's data. Exits non-zero if isolation does not hold.

use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use http::HeaderName;
use serde_json::json;
use tenant_router::repository::EntitySchema;
use tenant_router::{OperationContext, RouterConfig, StorageConnector, TenantId, TenantRouter};
use tracing::info;

/// Initializes the tracing subscriber. `RUST_LOG` overrides `level`.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("tenant_router={},tenant_router_cli={}", level, level))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Picks the storage connector from the base URI scheme.
fn create_connector(config: &RouterConfig) -> anyhow::Result<Arc<dyn StorageConnector>> {
    if config.base_uri.starts_with("mongodb://") || config.base_uri.starts_with("mongodb+srv://") {
        return create_mongodb_connector();
    }
    create_memory_connector()
}

#[cfg(feature = "mongodb")]
fn create_mongodb_connector() -> anyhow::Result<Arc<dyn StorageConnector>> {
    use tenant_router::backends::mongodb::MongoConnector;
    Ok(Arc::new(MongoConnector::new()))
}

/// Fallback when mongodb feature is not enabled.
#[cfg(not(feature = "mongodb"))]
fn create_mongodb_connector() -> anyhow::Result<Arc<dyn StorageConnector>> {
    bail!(
        "MongoDB URIs require the 'mongodb' feature. \
         Build with: cargo build -p tenant-router-cli --features mongodb"
    )
}

#[cfg(feature = "memory")]
fn create_memory_connector() -> anyhow::Result<Arc<dyn StorageConnector>> {
    use tenant_router::backends::memory::MemoryConnector;
    Ok(Arc::new(MemoryConnector::new()))
}

/// Fallback when memory feature is not enabled.
#[cfg(not(feature = "memory"))]
fn create_memory_connector() -> anyhow::Result<Arc<dyn StorageConnector>> {
    bail!("The in-memory backend requires the 'memory' feature")
}

/// Builds a context carrying `tenant` in the configured tenant header.
fn tenant_context(header: &HeaderName, tenant: &str) -> anyhow::Result<OperationContext> {
    Ok(OperationContext::new()
        .with_header(header.clone(), tenant)?
        .with_correlation_id(format!("cli-{}", tenant.to_lowercase())))
}

/// Runs the two-tenant isolation scenario against `router`.
async fn run_scenario(router: &TenantRouter, header: &HeaderName) -> anyhow::Result<()> {
    let tenant_a = tenant_context(header, "A")?;
    let tenant_b = tenant_context(header, "B")?;

    let order = json!({"amount": 10, "tenantId": "B"});
    let order = order.as_object().cloned().context("order is not an object")?;
    let created = router.create("Order", order, &tenant_a).await?;
    let id = created.id().context("created order has no _id")?.to_string();
    info!(
        id = %id,
        namespace = %router.strategy().namespace(&TenantId::new("A"), "Order"),
        "Tenant A created an order"
    );

    if created.tenant_id() != Some("A") {
        bail!("order was stored under {:?} instead of tenant A", created.tenant_id());
    }

    router.read("Order", &id, &tenant_a).await?;

    match router.read("Order", &id, &tenant_b).await {
        Err(e) if e.is_not_found() => info!("Tenant B cannot read tenant A's order"),
        Err(e) => return Err(e.into()),
        Ok(_) => bail!("tenant B read tenant A's order"),
    }

    let updates = json!({"amount": 12});
    let updates = updates.as_object().cloned().context("updates are not an object")?;
    if router.update("Order", &id, updates.clone(), &tenant_b).await.is_ok() {
        bail!("tenant B updated tenant A's order");
    }
    let updated = router.update("Order", &id, updates, &tenant_a).await?;
    info!(amount = ?updated.get("amount"), "Tenant A updated its order");

    if router.delete("Order", &id, &tenant_b).await.is_ok() {
        bail!("tenant B deleted tenant A's order");
    }
    router.delete("Order", &id, &tenant_a).await?;

    info!(
        connections = router.registry().open_count(),
        "Isolation scenario passed"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RouterConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(
        strategy = %config.strategy,
        tenant_header = %config.tenant_header,
        "Starting tenant router"
    );

    let header = HeaderName::from_bytes(config.tenant_header.as_bytes())
        .context("Invalid tenant header name")?;
    let connector = create_connector(&config)?;
    let router = TenantRouter::builder(config, connector)
        .entity(EntitySchema::new("Order").require("amount"))
        .entity(EntitySchema::tenant())
        .build()
        .context("Invalid router configuration")?;

    let outcome = run_scenario(&router, &header).await;
    router.shutdown().await;
    outcome
}
