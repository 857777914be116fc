pub use duration::*;

mod duration;
