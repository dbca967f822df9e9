pub mod error;
pub mod reconcile;
pub mod service;

pub use error::*;
pub use reconcile::*;
pub use service::*;
