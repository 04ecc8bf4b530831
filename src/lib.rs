//! Libris application library
//!
//! Wires the catalog and accounts modules into the module kernel and serves
//! them over HTTP.

pub mod modules;
pub mod utils;

use anyhow::Context;
use axum::Router;
use libris_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Registry holding every application module.
pub fn registry(settings: &Settings) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, settings);
    registry
}

/// Build and initialize the registry, then return the HTTP router for it.
///
/// Used by integration tests and anything else that wants the full
/// application without binding a socket.
pub async fn app(settings: &Settings) -> anyhow::Result<Router> {
    let registry = registry(settings);
    registry
        .init_all(&InitCtx { settings })
        .await
        .context("module initialization failed")?;
    libris_http::build_router(&registry, settings)
}

/// Run the application until shutdown.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = registry(&settings);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served = libris_http::start_server(&registry, &settings).await;

    registry.stop_all().await?;
    served
}
