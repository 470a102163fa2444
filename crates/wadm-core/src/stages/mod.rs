//! Stage adapters.
//!
//! Each adapter performs exactly one call into the update service and checks
//! the answer for structural sanity. Adapters hold no data between calls;
//! whether a stage may run at all is decided by the orchestrator.

mod check;
mod download;
mod install;

pub use check::VersionCheckStage;
pub use download::DownloadStage;
pub use install::InstallStage;
