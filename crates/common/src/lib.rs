pub mod adapters;
pub mod config;
pub mod error;
pub mod types;

pub use adapters::{ExecutionAdapter, NotificationSink, TradeStore};
pub use config::{RuntimeConfig, TradingConfig};
pub use error::{Error, Result};
pub use types::*;
