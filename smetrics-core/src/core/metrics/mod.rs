pub use model::*;

mod model;
