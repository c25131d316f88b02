pub mod config;
pub mod error;
pub mod normalize;
pub mod retry;
pub mod types;

pub use config::{ClearMode, Config};
pub use error::ConfigError;
pub use normalize::normalize;
pub use retry::{RetryExhausted, RetryPolicy, Sleeper, TokioSleeper};
pub use types::MarketRecord;
