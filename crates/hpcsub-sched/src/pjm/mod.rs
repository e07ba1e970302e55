//! PJM scheduler integration (`pjsub`/`pjstat`/`pjdel`).
//!
//! Directives use the `#PJM` prefix. The resource group is derived at
//! render time from the node count, elapsed-time limit and memory mode.
//! The parameter set follows the Oakforest-PACS site profile.

mod adapter;
mod parser;
mod schema;
mod templates;

pub use adapter::{PjmAdapter, PjmConfig};
pub use schema::{DEFAULT_CORES_PER_NODE, resource_group};
