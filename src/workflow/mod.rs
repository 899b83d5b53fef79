//! The deposit workflow: a pure state machine plus the async orchestrator
//! that drives it and publishes snapshots to the UI.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{Collaborators, DisposalOrchestrator, InteractionView};
