//! Standard node-behavior library.
//!
//! Collection of built-in behaviors beyond the core `default` type:
//! logging, manual tasks, attribute writes, and attribute-guarded
//! branching.

mod attr;
mod debug;
mod gate;
mod task;

pub use attr::SetAttrBehavior;
pub use debug::LogBehavior;
pub use gate::AttrGateBehavior;
pub use task::ManualTaskBehavior;

use std::sync::Arc;
use weftcore::NodeTypeRegistry;

/// Register all standard behaviors with a registry.
pub fn register_all(registry: &mut NodeTypeRegistry) {
    registry.register(Arc::new(attr::SetAttrBehavior));
    registry.register(Arc::new(debug::LogBehavior));
    registry.register(Arc::new(gate::AttrGateBehavior));
    registry.register(Arc::new(task::ManualTaskBehavior));
}
