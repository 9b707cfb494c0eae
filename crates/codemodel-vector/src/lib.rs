pub mod error;
pub mod index;
pub mod search;
pub mod similarity;

pub use error::*;
pub use index::*;
pub use search::*;
pub use similarity::*;
