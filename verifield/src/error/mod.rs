//! Error types

mod session;
mod store;
mod transport;

pub use session::*;
pub use store::*;
pub use transport::*;
