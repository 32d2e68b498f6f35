//! Price sources: historical candle replay and the synthetic random walk.

pub mod cursor;
pub mod simulator;

pub use cursor::CandleCursor;
pub use simulator::{PriceSimulator, WalkConfig};
