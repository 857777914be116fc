pub use component::*;
pub use error::*;
pub use logger::*;

mod component;
mod error;
mod logger;
