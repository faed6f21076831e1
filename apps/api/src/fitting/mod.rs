// Deterministic session fitting. Pure, synchronous code: handlers run it through
// tokio::task::spawn_blocking.

pub mod engine;
pub mod handlers;
pub mod program;
pub mod time_model;
