mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod types;

#[cfg(test)]
mod tests;

pub use orchestrator::WastebinOrchestrator;
pub use types::{ComponentState, ShutdownHandle, ShutdownReason};
