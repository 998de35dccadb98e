pub mod binance;
pub mod executor;
pub mod live;
pub mod notify;
pub mod replay;
pub mod stats;
pub mod store;

pub use binance::{BinanceClient, KlineStream};
pub use executor::TradeExecutor;
pub use live::LiveDriver;
pub use notify::LogNotifier;
pub use replay::{run, BacktestReport};
pub use stats::{summarize, PerformanceSummary};
pub use store::SqliteTradeStore;
