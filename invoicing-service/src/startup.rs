//! Application startup and lifecycle management.

use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Router,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware, RequestId};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::config::{InvoicingConfig, StorageBackend};
use crate::handlers::{self, auth, customers, invoices, products};
use crate::middleware::auth_middleware;
use crate::services::{init_metrics, EntityStore, InvoiceWorkflow, JwtService, MemoryStore, PgStore};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn EntityStore>,
    pub jwt: Arc<JwtService>,
    pub workflow: InvoiceWorkflow,
}

impl AppState {
    pub fn new(config: &InvoicingConfig, store: Arc<dyn EntityStore>) -> Self {
        Self {
            workflow: InvoiceWorkflow::new(store.clone()),
            jwt: Arc::new(JwtService::new(&config.jwt)),
            store,
        }
    }
}

/// Build the HTTP router.
///
/// Product routes and invoice creation sit behind bearer authentication;
/// role checks happen in the handlers.
pub fn router(state: AppState) -> Router {
    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let catalog = Router::new()
        .route(
            "/productos",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/productos/:id",
            get(products::get_product)
                .put(products::update_product)
                .delete(products::delete_product),
        )
        .route_layer(require_auth.clone());

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route(
            "/clientes",
            get(customers::list_customers).post(customers::create_customer),
        )
        .route("/clientes/:id", get(customers::get_customer))
        .route(
            "/facturas",
            get(invoices::list_invoices)
                .merge(post(invoices::create_invoice).route_layer(require_auth)),
        )
        .route("/facturas/:id", get(invoices::get_invoice))
        .merge(catalog)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    // Set by request_id_middleware, which wraps this layer.
                    let request_id = req
                        .extensions()
                        .get::<RequestId>()
                        .map(|id| id.0.as_str())
                        .unwrap_or("-");
                    tracing::info_span!(
                        "http_request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id = %request_id,
                    )
                })
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    http_port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application, connecting to the configured store.
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let store: Arc<dyn EntityStore> = match config.storage {
            StorageBackend::Postgres => {
                let db = PgStore::connect(
                    config.database.url.expose_secret(),
                    config.database.max_connections,
                    config.database.min_connections,
                )
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to connect to PostgreSQL");
                    e
                })?;

                db.run_migrations().await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to run migrations");
                    e
                })?;

                Arc::new(db)
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage; data will not survive a restart");
                Arc::new(MemoryStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    /// Build the application on top of an existing store.
    pub async fn build_with_store(
        config: InvoicingConfig,
        store: Arc<dyn EntityStore>,
    ) -> Result<Self, AppError> {
        init_metrics();

        let addr = config.common.socket_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let http_port = listener.local_addr()?.port();

        tracing::info!(http_port = http_port, "Invoicing service listener bound");

        Ok(Self {
            http_port,
            listener,
            state: AppState::new(&config, store),
        })
    }

    /// Get the HTTP port the server is listening on.
    pub fn http_port(&self) -> u16 {
        self.http_port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let app = router(self.state);

        tracing::info!(
            service = "invoicing-service",
            version = env!("CARGO_PKG_VERSION"),
            http_port = self.http_port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, app).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
