//! SurrealDB client factory, migration runner and the `db` core module.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::opt::auth::Root;

use library_kernel::settings::DatabaseSettings;
use library_kernel::{Db, InitCtx, Migration, Module};

/// Table recording which module migrations have already run.
const MIGRATION_TABLE: &str = "schema_migration";

/// Establish and verify the database connection.
///
/// Connecting, signing in and selecting the namespace are bounded together by
/// `connect_timeout_ms`. Callers treat any error here as fatal.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Db> {
    let timeout = settings.connect_timeout();
    let endpoint = settings.endpoint.clone();

    let db = tokio::time::timeout(timeout, open(settings))
        .await
        .map_err(|_| anyhow!("timed out after {:?} connecting to {}", timeout, endpoint))??;

    db.health()
        .await
        .with_context(|| format!("database at {} failed its health check", endpoint))?;

    tracing::info!(
        target: "library-db",
        endpoint = %endpoint,
        namespace = %settings.namespace,
        database = %settings.database,
        "connected to database"
    );

    Ok(db)
}

async fn open(settings: &DatabaseSettings) -> anyhow::Result<Db> {
    let db = surrealdb::engine::any::connect(settings.endpoint.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", settings.endpoint))?;

    if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
        db.signin(Root {
            username: username.as_str(),
            password: password.as_str(),
        })
        .await
        .with_context(|| format!("failed to sign in as '{}'", username))?;
    }

    db.use_ns(settings.namespace.as_str())
        .use_db(settings.database.as_str())
        .await
        .with_context(|| {
            format!(
                "failed to select namespace '{}' / database '{}'",
                settings.namespace, settings.database
            )
        })?;

    Ok(db)
}

#[derive(Debug, Deserialize)]
struct AppliedMigration {
    #[allow(dead_code)]
    migration: String,
}

/// Apply every migration not yet recorded in the ledger, in the given order.
///
/// Returns the number of migrations applied by this call.
pub async fn apply_migrations(db: &Db, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
    let mut applied = 0;

    for (module, migration) in migrations {
        let key = migration.ledger_key(module);

        let mut response = db
            .query("SELECT migration FROM type::thing($table, $key)")
            .bind(("table", MIGRATION_TABLE))
            .bind(("key", key.clone()))
            .await
            .with_context(|| format!("failed to read migration ledger for '{}'", key))?;
        let existing: Option<AppliedMigration> = response.take(0)?;
        if existing.is_some() {
            tracing::debug!(target: "library-db", module = %module, migration = migration.id, "migration already applied");
            continue;
        }

        db.query(migration.up)
            .await
            .and_then(|response| response.check())
            .with_context(|| format!("migration '{}' of module '{}' failed", migration.id, module))?;

        db.query(
            "CREATE type::thing($table, $key) CONTENT { module: $module, migration: $migration, applied_at: time::now() }",
        )
        .bind(("table", MIGRATION_TABLE))
        .bind(("key", key))
        .bind(("module", module.clone()))
        .bind(("migration", migration.id))
        .await
        .and_then(|response| response.check())
        .with_context(|| format!("failed to record migration '{}'", migration.id))?;

        tracing::info!(target: "library-db", module = %module, migration = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

/// Core module owning the database lifecycle hooks.
pub struct DatabaseModule;

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        ctx.db
            .health()
            .await
            .with_context(|| "database health check failed during init")?;
        tracing::info!(
            module = self.name(),
            endpoint = %ctx.settings.database.endpoint,
            "database module initialized"
        );
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "database connection released");
        Ok(())
    }
}

/// Create a new instance of the database core module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(DatabaseModule)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![(
            "books".to_string(),
            Migration {
                id: "001_init",
                up: "DEFINE TABLE book SCHEMALESS;",
            },
        )]
    }

    #[tokio::test]
    async fn connects_to_in_memory_engine() {
        let db = connect(&DatabaseSettings::in_memory()).await.unwrap();
        db.health().await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails() {
        let settings = DatabaseSettings {
            endpoint: "ws://127.0.0.1:1".to_string(),
            connect_timeout_ms: 500,
            ..DatabaseSettings::default()
        };
        assert!(connect(&settings).await.is_err());
    }

    #[tokio::test]
    async fn migrations_are_applied_once() {
        let db = connect(&DatabaseSettings::in_memory()).await.unwrap();

        assert_eq!(apply_migrations(&db, &migrations()).await.unwrap(), 1);
        assert_eq!(apply_migrations(&db, &migrations()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failing_migration_reports_module_and_id() {
        let db = connect(&DatabaseSettings::in_memory()).await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "DEFINE TABLE;",
            },
        )];

        let err = apply_migrations(&db, &broken).await.unwrap_err();
        assert!(err.to_string().contains("001_broken"));
    }
}
