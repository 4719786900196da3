//! Core domain model and contracts for mockprep.

pub mod error;
pub mod model;
pub mod protocol;

pub use error::*;
pub use model::*;
pub use protocol::*;
