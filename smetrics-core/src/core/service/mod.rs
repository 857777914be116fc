pub use envelope::*;
pub use error::*;
pub use service::*;

mod envelope;
mod error;
mod service;
