//! Builders to construct pools and registries from configuration.

pub mod pool_builder;

pub use pool_builder::{build_pool, build_registry};
