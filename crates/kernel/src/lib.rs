//! Kernel for the library service: module contract, registry, settings and the
//! shared database handle type.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Migration, Module};
pub use registry::ModuleRegistry;

/// Process-wide database handle. Cloning shares the underlying connection.
pub type Db = surrealdb::Surreal<surrealdb::engine::any::Any>;
