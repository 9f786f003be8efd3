//! Kernel of the Libris service: layered settings plus the module lifecycle
//! that every feature module plugs into.

pub mod module;
pub mod registry;
pub mod settings;

pub use module::{InitCtx, Module};
pub use registry::ModuleRegistry;
