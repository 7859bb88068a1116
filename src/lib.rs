//! Book catalog service.
//!
//! Wires the database connection, the module registry and the HTTP server
//! together. The catalog itself lives in [`modules::books`].

pub mod modules;

use anyhow::Context;

use library_kernel::{settings::Settings, Db, InitCtx, ModuleRegistry};

/// Connect to the database and register every module against it.
async fn bootstrap(settings: &Settings) -> anyhow::Result<(Db, ModuleRegistry)> {
    let db = library_db::connect(&settings.database)
        .await
        .with_context(|| format!("failed to connect to {}", settings.database.endpoint))?;

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, &db, settings);

    Ok((db, registry))
}

/// Apply pending schema migrations and exit.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let (db, registry) = bootstrap(settings).await?;
    let applied = library_db::apply_migrations(&db, &registry.collect_migrations()).await?;
    tracing::info!(applied, "migrations complete");
    Ok(applied)
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.endpoint,
        "library service bootstrap starting"
    );

    let (db, registry) = bootstrap(&settings).await?;

    let applied = library_db::apply_migrations(&db, &registry.collect_migrations()).await?;
    tracing::info!(applied, "schema up to date");

    let ctx = InitCtx::new(&settings, &db);
    registry.init_all(&ctx).await?;
    registry.start_all(&ctx).await?;

    let served =
        library_http::start_server(&registry, &settings, library_http::shutdown_signal()).await;

    // Stop modules even when the server failed, then report the first error.
    let stopped = registry.stop_all().await;
    served?;
    stopped?;

    tracing::info!("library service stopped");
    Ok(())
}
