//! Request handlers.

pub mod analyze;
pub mod form;
pub mod health;
pub mod index;
pub mod status;
pub mod videos;

pub use analyze::*;
pub use health::*;
pub use index::*;
pub use status::*;
pub use videos::*;
