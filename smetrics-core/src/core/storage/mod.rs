pub use database::*;
pub use error::*;
pub use file::*;
pub use memory::*;
pub use repository::*;

mod database;
mod error;
mod file;
mod memory;
mod repository;
