pub mod accounts;
pub mod catalog;

use libris_kernel::{settings::Settings, ModuleRegistry};

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, settings: &Settings) {
    registry.register_core(accounts::create_module());
    registry.register_custom(catalog::create_module(settings));
}
