use core_types::{CoreError, OrderId, OrderStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("No trading pair found for {source_asset}/{dest_asset}")]
    NoMarket {
        source_asset: String,
        dest_asset: String,
    },

    #[error("Gateway error: {0}")]
    Gateway(#[from] api_client::ApiError),

    #[error("Cannot {operation} order {order_id}: status is {status}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        operation: &'static str,
    },

    #[error("No confirmed deposit covering order {0} has been observed")]
    AwaitingDeposit(OrderId),

    #[error("Order '{0}' not found.")]
    NotFound(OrderId),

    #[error("Order '{0}' already exists.")]
    DuplicateOrder(OrderId),

    #[error("Deposit address {address} for {asset} is already assigned to another order")]
    DuplicateDepositAddress { asset: String, address: String },

    #[error("Execution of order {order_id} failed: {reason}")]
    ExecutionFailed { order_id: OrderId, reason: String },

    #[error("Order state error: {0}")]
    Core(#[from] CoreError),
}
