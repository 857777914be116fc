pub use error::*;
pub use signer::*;

mod error;
mod signer;
