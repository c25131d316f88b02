pub mod client;
pub mod migrate;
pub mod reader;
pub mod store;
pub mod writer;

#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
#[cfg(feature = "test-utils")]
pub mod testutil;

pub use client::GraphClient;
pub use neo4rs::query;
pub use reader::GraphTotals;
pub use store::{GraphStore, NodeKey, NodeLabel, PropValue, RelType};
pub use writer::GraphWriter;
