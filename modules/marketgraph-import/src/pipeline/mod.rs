pub mod batch;
pub mod stats;

pub use batch::BatchCoordinator;
pub use stats::ImportStats;
