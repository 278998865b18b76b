//! Application startup and lifecycle management.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::auth::{require_bearer, JwtVerifier};
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::{InvoicingConfig, StorageBackend};
use crate::handlers::health::{health_check, metrics_handler, readiness_check};
use crate::handlers::invoices::{
    create_invoice, delete_invoice, get_invoice, list_invoices, patch_invoice, pay_invoice,
    recompute_invoice, replace_invoice,
};
use crate::handlers::transactions::{get_transaction, list_transactions};
use crate::services::{init_metrics, InvoiceService, InvoiceStore, MemoryStore, PgStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub invoices: InvoiceService,
}

/// Build the HTTP router. API routes require a bearer token; the operational
/// routes do not.
pub fn router(state: AppState, verifier: Arc<JwtVerifier>, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/invoices", get(list_invoices).post(create_invoice))
        .route(
            "/invoices/:id",
            get(get_invoice)
                .put(replace_invoice)
                .patch(patch_invoice)
                .delete(delete_invoice),
        )
        .route("/invoices/:id/pay", post(pay_invoice))
        .route("/invoices/:id/recompute", post(recompute_invoice))
        .route("/transactions", get(list_transactions))
        .route("/transactions/:id", get(get_transaction))
        .route_layer(middleware::from_fn_with_state(verifier, require_bearer));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .merge(api)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the store named in the configuration.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn InvoiceStore> = match config.storage {
            StorageBackend::Postgres => {
                let db = PgStore::connect(
                    &config.database.url,
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                if config.database.run_migrations {
                    db.run_migrations().await.map_err(|e| {
                        tracing::error!(error = %e, "Failed to run migrations");
                        e
                    })?;
                }

                Arc::new(db)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store; data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    /// Build the application around an existing store.
    pub async fn build_with_store(
        config: InvoicingConfig,
        store: Arc<dyn InvoiceStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let verifier = Arc::new(JwtVerifier::new(
            &config.auth.jwt_secret,
            config.auth.jwt_issuer.as_deref(),
            config.auth.jwt_audience.as_deref(),
        ));

        let addr = format!("{}:{}", config.common.host, config.common.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        let request_timeout = config.common.request_timeout();
        let state = AppState {
            invoices: InvoiceService::new(store),
        };
        let router = router(state, verifier, request_timeout);

        tracing::info!(http_port = port, "Invoicing service listener bound");

        Ok(Self {
            port,
            listener,
            router,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, self.router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            e
        })
    }
}
