//! Domain types for the simulation core.

pub mod candle;
pub mod ledger;
pub mod order;
pub mod product;
pub mod trade;

pub use candle::{Candle, CandleSeries, SeriesError, REQUIRED_COLUMNS};
pub use ledger::{Ledger, LedgerError};
pub use order::{InvalidSide, Order, OrderId, OrderIdGen, OrderStatus, OrderType, Side};
pub use product::{InvalidProduct, ProductId};
pub use trade::{TradeRecord, ValuationPoint};
