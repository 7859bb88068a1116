use async_trait::async_trait;
use axum::Router;

use crate::{settings::Settings, Db};

/// Shared resources handed to modules during `init` and `start`.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
    pub db: &'a Db,
}

impl<'a> InitCtx<'a> {
    pub fn new(settings: &'a Settings, db: &'a Db) -> Self {
        Self { settings, db }
    }
}

/// A SurrealQL schema step owned by a module. Applied at most once.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

impl Migration {
    /// Ledger key, unique across modules.
    pub fn ledger_key(&self, module: &str) -> String {
        format!("{}__{}", module, self.id)
    }
}

/// A unit of the service: lifecycle hooks, HTTP routes, API docs and schema.
///
/// Every hook has a no-op default so a module only implements what it owns.
#[async_trait]
pub trait Module: Sync + Send {
    /// Stable name; routes are mounted under `/api/{name}`.
    fn name(&self) -> &'static str;

    /// Runs once migrations have been applied.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
    }

    /// OpenAPI fragment (`paths` relative to the mount point, plus
    /// `components`), merged into the served document.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema steps in application order.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Runs after every module has been initialized, before serving.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs on shutdown, custom modules before core ones.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
