use std::net::{AddrParseError, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use metrics::describe_counter;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

use crate::auth::{GoTrueVerifier, IdentityVerifier, PasswordVerifier, VerifierSetupError};
use crate::catalog::postgres::PostgresCatalog;
use crate::catalog::Catalog;
use crate::schema::{Identifier, InvalidIdentifier};
use crate::service::{SchemaPolicy, SchemaService};

use super::schema;

pub const REQUESTS: &str = "schema_manager_requests";

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Error connecting to the catalog: {0}")]
    Catalog(#[from] sqlx::Error),

    #[error(transparent)]
    Verifier(#[from] VerifierSetupError),

    #[error("Invalid identifier in configuration: {0}")]
    Identifier(#[from] InvalidIdentifier),

    #[error("Error parsing the metrics export address: {0}")]
    MetricsAddress(#[from] AddrParseError),

    #[error("Error installing the metrics exporter: {0}")]
    MetricsExporter(#[from] BuildError),
}

/// Everything a request handler needs
#[derive(Debug, Clone)]
pub struct SchemaManagerContext {
    pub service: SchemaService,
    pub verifier: Arc<dyn IdentityVerifier>,
}

impl SchemaManagerContext {
    pub fn new(service: SchemaService, verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { service, verifier }
    }
}

pub fn build_policy(
    config: &schema::SchemaManagerConfig,
) -> Result<SchemaPolicy, InvalidIdentifier> {
    let schema::Catalog::Postgres(schema::Postgres {
        schema: schema_name,
        ..
    }) = &config.catalog;

    Ok(SchemaPolicy {
        schema: Identifier::parse(schema_name)?,
        protected_tables: config
            .schema
            .protected_tables
            .iter()
            .map(|t| Identifier::parse(t))
            .collect::<Result<_, _>>()?,
        system_columns: config.schema.system_columns.clone(),
    })
}

pub fn build_verifier(
    auth: &schema::Auth,
) -> Result<Arc<dyn IdentityVerifier>, VerifierSetupError> {
    let verifier: Arc<dyn IdentityVerifier> = match auth {
        schema::Auth::GoTrue(schema::GoTrue {
            url,
            anon_key,
            timeout_secs,
        }) => Arc::new(GoTrueVerifier::new(
            url,
            anon_key.clone(),
            Duration::from_secs(*timeout_secs),
        )?),
        schema::Auth::Password(schema::Password { sha256_hash }) => {
            Arc::new(PasswordVerifier::new(sha256_hash.clone()))
        }
    };
    Ok(verifier)
}

async fn build_catalog(
    config: &schema::SchemaManagerConfig,
) -> Result<Arc<dyn Catalog>, ContextError> {
    let catalog: Arc<dyn Catalog> = match &config.catalog {
        schema::Catalog::Postgres(schema::Postgres {
            dsn,
            schema: schema_name,
            max_connections,
        }) => Arc::new(PostgresCatalog::connect(dsn, schema_name, *max_connections).await?),
    };
    Ok(catalog)
}

pub async fn build_context(
    config: &schema::SchemaManagerConfig,
) -> Result<SchemaManagerContext, ContextError> {
    let policy = build_policy(config)?;
    let verifier = build_verifier(&config.auth)?;
    let catalog = build_catalog(config).await?;

    info!(
        schema = policy.schema.as_str(),
        protected_tables = ?policy.protected_tables,
        "Connected to the catalog"
    );

    Ok(SchemaManagerContext::new(
        SchemaService::new(catalog, policy),
        verifier,
    ))
}

pub fn setup_metrics(metrics: &schema::Metrics) -> Result<(), ContextError> {
    let addr: SocketAddr = format!("{}:{}", metrics.host, metrics.port).parse()?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS, "Counter tracking schema manager requests");
    info!("Exporting Prometheus metrics on {addr}");
    Ok(())
}
