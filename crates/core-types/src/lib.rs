pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{DepositStatus, OrderStatus, TradeSide};
pub use error::CoreError;
pub use structs::{
    DepositAddress, DepositFilter, DepositMatch, DepositRecord, MarketOrder, NewOrder, Order,
    OrderId, OrderStats, Quote, TradeReceipt, TradingPair, WithdrawalReceipt,
};
