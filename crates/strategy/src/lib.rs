pub mod engine;
pub mod indicators;
pub mod regime;
pub mod signal;

pub use engine::{IndicatorEngine, IndicatorRow};
pub use regime::Regime;
pub use signal::SignalGenerator;
