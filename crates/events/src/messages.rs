use chrono::{DateTime, Utc};
use core_types::{Order, OrderId, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The subset of an order that subscribers need to describe a transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: Decimal,
    pub dest_amount: Decimal,
    pub destination_address: String,
    pub timestamp: DateTime<Utc>,
}

impl OrderSnapshot {
    pub fn of(order: &Order, timestamp: DateTime<Utc>) -> Self {
        Self {
            order_id: order.id.clone(),
            status: order.status,
            source_asset: order.source_asset.clone(),
            dest_asset: order.dest_asset.clone(),
            source_amount: order.source_amount,
            dest_amount: order.dest_amount,
            destination_address: order.destination_address.clone(),
            timestamp,
        }
    }
}

/// A state change of a swap order.
///
/// Serialized with `#[serde(tag = "type", content = "payload")]`, e.g.
/// `{ "type": "OrderFailed", "payload": { "order": {...}, "error": "..." } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum SwapEvent {
    OrderCreated { order: OrderSnapshot },
    OrderProcessing { order: OrderSnapshot, deposit_amount: Decimal },
    OrderCompleted { order: OrderSnapshot, settlement_ref: String },
    /// Funds may be in flight; an operator has to look at it.
    OrderFailed {
        order: OrderSnapshot,
        error: String,
        trade_ref: Option<String>,
    },
    OrderExpired { order: OrderSnapshot },
}

impl SwapEvent {
    pub fn order(&self) -> &OrderSnapshot {
        match self {
            SwapEvent::OrderCreated { order }
            | SwapEvent::OrderProcessing { order, .. }
            | SwapEvent::OrderCompleted { order, .. }
            | SwapEvent::OrderFailed { order, .. }
            | SwapEvent::OrderExpired { order } => order,
        }
    }
}
