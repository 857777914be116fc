pub mod event;
pub mod metrics;
pub mod service;
pub mod signing;
pub mod storage;
pub mod utils;
