//! Core data model for the CodeModel engine.
//!
//! - `types`: identifiers, kinds, locations and structural metrics
//! - `symbol` / `relationship`: the records fed in by the parser
//! - `error`: the shared error taxonomy
//! - `config` / `logging`: ambient configuration and tracing bootstrap
//! - `traits`: collaborator interfaces (embedding generator)

pub mod config;
pub mod error;
pub mod logging;
pub mod relationship;
pub mod symbol;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use logging::*;
pub use relationship::*;
pub use symbol::*;
pub use traits::*;
pub use types::*;
