pub mod confirm;
pub mod connect;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod source;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::ImportError;
pub use orchestrator::{ImportReport, Orchestrator, Phase, RunOutcome};
pub use pipeline::{BatchCoordinator, ImportStats};
pub use traits::{Document, DocumentSource, DocumentStream};
