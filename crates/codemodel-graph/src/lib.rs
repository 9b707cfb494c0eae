pub mod dataflow;
pub mod scc;
pub mod snapshot;
pub mod store;
pub mod traversal;

pub use dataflow::*;
pub use scc::*;
pub use snapshot::*;
pub use store::*;
pub use traversal::*;
