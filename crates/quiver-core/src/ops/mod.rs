//! Package operations: the single-package installer and the concurrent
//! orchestrator on top of it.

pub mod context;
pub mod error;
pub mod flow;
pub mod install;
pub mod orchestrate;

pub use context::InstallContext;
pub use error::{FatalError, InstallError};
pub use install::{
    InstallOutcome, cleanup_partial, format_size, install_package, perform_ux_checks,
};
pub use orchestrate::{InstallSummary, install_all, reject_all};
