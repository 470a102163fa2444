//! wadm-core - Self-update pipeline for the Windows admin tool
//!
//! This crate drives the application's self-update against the privileged
//! local backend process:
//!
//! - **bridge**: Typed access to the backend's update commands
//! - **stages**: Version check, download and install adapters
//! - **restart**: Deferred and immediate restart coordination
//! - **orchestrator**: Pipeline state machine and action gating
//! - **view**: Presentation model for the update panel

pub mod bridge;
pub mod error;
pub mod orchestrator;
pub mod restart;
pub mod stages;
pub mod types;
pub mod view;

// Re-export commonly used types
pub use bridge::UpdateService;
pub use error::{Error, PreconditionError, Result, UpdateServiceError};
pub use orchestrator::{Orchestrator, OrchestratorConfig, OrchestratorHandle};
