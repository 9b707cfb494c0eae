//! Derived views over the symbol graph. Everything here is recomputed on demand
//! from the current graph state and never written back into it.

pub mod architecture;
pub mod complexity;
pub mod coverage;
pub mod patterns;
pub mod refactoring;

pub use architecture::*;
pub use complexity::*;
pub use coverage::*;
pub use patterns::*;
pub use refactoring::*;
