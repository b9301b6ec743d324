pub mod active_trade;
pub mod candle;
pub mod result;
pub mod signal;
pub mod watchlist;

pub use active_trade::{ActiveTrade, TradeStatus};
pub use candle::Candle;
pub use result::{ExitReason, TradeResult};
pub use signal::{Direction, ExchangeType, Signal};
pub use watchlist::WatchlistEntry;
