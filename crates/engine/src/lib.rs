//! # Swapdesk Engine
//!
//! The swap order lifecycle: quoting, the order store, the state machine that
//! drives an order from creation to a terminal state, and the background
//! reconciliation loop that watches for deposits.

pub mod clock;
pub mod error;
pub mod lifecycle;
pub mod quote;
pub mod reconciler;
pub mod store;
pub mod util;
pub mod validation;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::EngineError;
pub use lifecycle::{CreateOrderRequest, DepositCheck, DepositPoll, OrderListing, SwapManager};
pub use quote::{Market, QuoteEngine, parse_amount};
pub use reconciler::{CycleReport, Reconciler};
pub use store::OrderStore;
pub use validation::{normalize_asset, validate_destination_address};
