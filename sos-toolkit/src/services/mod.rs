//! Service discovery and dependency resolution.

mod catalog;
mod resolver;


#[cfg(test)]
pub use catalog::MockServiceSource;
pub use catalog::{ServiceCatalog, ServiceDefinition, ServiceSource};
pub use resolver::{ServiceLayers, ServiceResolver};
