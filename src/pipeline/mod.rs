pub mod orchestrator;
pub mod report;

pub use orchestrator::RunOrchestrator;
pub use report::RunReport;
