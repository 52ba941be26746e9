pub mod core;
pub mod listing;
pub mod monitoring;
pub mod notify;
pub mod pipeline;
pub mod scanner;

pub use pipeline::{RunOrchestrator, RunReport};
