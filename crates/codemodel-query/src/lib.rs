//! Single entry surface over the CodeModel engine.
//!
//! [`CodeModel`] owns the graph store, the vector index and the optional
//! embedding provider, and exposes every analytical operation both as a typed
//! method and by name through [`CodeModel::execute`].

pub mod error;
pub mod facade;
pub mod operations;
pub mod requests;

pub use error::*;
pub use facade::*;
pub use operations::*;
pub use requests::*;
