pub mod books;

use library_kernel::{settings::Settings, Db, ModuleRegistry};

/// Register the database core module and every catalog module with the registry
pub fn register_all(registry: &mut ModuleRegistry, db: &Db, settings: &Settings) {
    registry.register_core(library_db::create_module());
    registry.register_custom(books::create_module(db.clone(), &settings.database));
}
