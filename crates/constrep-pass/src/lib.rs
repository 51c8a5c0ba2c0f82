//! Graph rewrite passes over the constrep graph IR.
//!
//! # Modules
//!
//! - [`pass`] -- The [`GraphPass`] trait and the options passes receive
//! - [`replicate`] -- Per-device replication of small constants
//! - [`config`] -- Replication settings
//! - [`dump`] -- JSON graph dumps for debugging
//! - [`error`] -- Errors that abort a pass

pub mod config;
pub mod dump;
pub mod error;
pub mod pass;
pub mod replicate;

pub use config::{ReplicateConstantsConfig, DEFAULT_MAX_ELEMENTS};
pub use error::PassError;
pub use pass::{GraphPass, PassOptions};
pub use replicate::{PassReport, ReplicateConstantsPass};
