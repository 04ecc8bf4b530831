//! HTTP server facade for Libris: router, error envelope, sessions, identity and OpenAPI.

use std::time::Duration;

use anyhow::Context;
use axum::{routing::get, Router};

use libris_authz::UserDirectory;
use libris_kernel::{settings::Settings, ModuleRegistry};

pub mod error;
pub mod extract;
pub mod identity;
pub mod router;
pub mod session;

use identity::Identity;
use router::RouterBuilder;
use session::SessionStore;

/// Start the HTTP server and serve until Ctrl-C
pub async fn start_server(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        "starting HTTP server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    let app = build_router(registry, settings).context("failed to build HTTP router")?;

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.server.host, settings.server.port))
            .await
            .context("failed to bind to address")?;

    tracing::info!(
        "HTTP server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<Router> {
    let directory =
        UserDirectory::from_settings(&settings.auth).context("invalid [auth] configuration")?;
    let identity = Identity::new(directory, settings.auth.login_url.clone());

    let mut router_builder = RouterBuilder::new().route("/healthz", get(health_check));

    for module in registry.modules() {
        let module_name = module.name();
        tracing::info!(
            module = module_name,
            "mounting module routes under /api/{}",
            module_name
        );
        router_builder = router_builder.mount_module(module_name, module.routes());
    }

    router_builder = router_builder
        .with_openapi(registry)
        .with_identity(identity)
        .with_sessions(SessionStore::with_limits(
            Duration::from_secs(settings.server.session_idle_secs),
            settings.server.max_sessions,
        ))
        .with_timeout(settings.server.request_timeout_ms)
        .with_cors()
        .with_tracing()
        .with_request_id();

    Ok(router_builder.build())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
