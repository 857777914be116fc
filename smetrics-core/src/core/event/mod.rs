pub use event::*;
pub use observer::*;

mod event;
mod observer;
