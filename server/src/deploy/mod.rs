//! Setup reconciliation

pub mod fsm;
pub mod orchestrator;

pub use orchestrator::SetupOrchestrator;
