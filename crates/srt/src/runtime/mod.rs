//! Graph instances: processed nodes plus the value arena they read and write.

mod module;
mod processed_node;

pub use module::StaticModule;
pub use processed_node::ProcessedNode;
