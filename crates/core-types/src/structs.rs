use crate::enums::{DepositStatus, OrderStatus, TradeSide};
use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a swap order, e.g. `SWAP_1718000000000_9f2c01ab`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(String);

impl OrderId {
    /// Generates a fresh identifier from the creation time and 4 random bytes.
    pub fn generate(created_at: DateTime<Utc>) -> Self {
        let random = Uuid::new_v4().simple().to_string();
        Self(format!("SWAP_{}_{}", created_at.timestamp_millis(), &random[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An exchange spot market, e.g. base `BTC` / quote `USDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// The pair with base and quote swapped.
    pub fn reversed(&self) -> Self {
        Self::new(self.quote.clone(), self.base.clone())
    }

    /// The exchange symbol, e.g. `BTCUSDT`.
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A computed conversion for a prospective swap. Valid only at computation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: Decimal,
    /// Converted amount after the service fee, in destination units.
    pub dest_amount: Decimal,
    /// The raw market price of `pair`.
    pub rate: Decimal,
    /// Service fee in destination units.
    pub fee: Decimal,
    /// The exchange symbol the price was read from.
    pub pair: String,
    /// True when the price came from the reverse pair (`dest+source`).
    pub inverted: bool,
}

/// A deposit address issued by the exchange for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositAddress {
    pub address: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

/// One entry of the exchange's deposit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    pub address: String,
    pub amount: Decimal,
    pub status: DepositStatus,
    pub tx_ref: String,
    #[serde(default)]
    pub inserted_at: Option<DateTime<Utc>>,
}

/// Narrows a deposit history query. `None` fields do not filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepositFilter {
    pub address: Option<String>,
    pub status: Option<DepositStatus>,
    /// Ignore records credited before this instant.
    pub since: Option<DateTime<Utc>>,
}

impl DepositFilter {
    pub fn matches(&self, record: &DepositRecord) -> bool {
        if let Some(address) = &self.address {
            if &record.address != address {
                return false;
            }
        }
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        match (self.since, record.inserted_at) {
            (Some(since), Some(at)) => at >= since,
            _ => true,
        }
    }
}

/// The deposit that moved an order out of `pending`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositMatch {
    pub amount: Decimal,
    pub tx_ref: Option<String>,
}

/// A market order submitted to the exchange.
///
/// For `Sell` the quantity is in base units of `pair`; for `Buy` it is the
/// amount of quote currency to spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketOrder {
    pub pair: TradingPair,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub client_order_id: String,
}

/// Acknowledgement of a placed market order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub settlement_ref: String,
    /// Amount of the received asset, when the exchange reports the fill.
    pub received: Option<Decimal>,
}

/// Acknowledgement of a withdrawal request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    pub settlement_ref: String,
}

/// One user-initiated swap request tracked through its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "orderId")]
    pub id: OrderId,
    pub status: OrderStatus,
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: Decimal,
    /// The payout promised at creation. Never re-quoted.
    pub dest_amount: Decimal,
    pub deposit_address: String,
    pub deposit_network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_memo: Option<String>,
    pub destination_address: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub deposit: Option<DepositMatch>,
    pub trade_ref: Option<String>,
    pub settlement_ref: Option<String>,
    pub error: Option<String>,
}

/// Everything needed to open a new order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: Decimal,
    pub dest_amount: Decimal,
    pub deposit: DepositAddress,
    pub destination_address: String,
}

impl Order {
    /// Opens a `pending` order that expires `ttl` after `created_at`.
    pub fn open(new: NewOrder, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: OrderId::generate(created_at),
            status: OrderStatus::Pending,
            source_asset: new.source_asset,
            dest_asset: new.dest_asset,
            source_amount: new.source_amount,
            dest_amount: new.dest_amount,
            deposit_address: new.deposit.address,
            deposit_network: new.deposit.network,
            deposit_memo: new.deposit.memo,
            destination_address: new.destination_address,
            created_at,
            expires_at: created_at + ttl,
            deposit: None,
            trade_ref: None,
            settlement_ref: None,
            error: None,
        }
    }

    /// A pending order whose validity window has passed.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Pending && now > self.expires_at
    }

    fn transition(&mut self, next: OrderStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                order_id: self.id.to_string(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> processing`, recording the deposit that triggered it.
    pub fn begin_processing(&mut self, deposit: DepositMatch) -> Result<(), CoreError> {
        self.transition(OrderStatus::Processing)?;
        self.deposit = Some(deposit);
        Ok(())
    }

    /// Records the exchange trade id while the withdrawal is still outstanding.
    pub fn record_trade(&mut self, trade_ref: String) -> Result<(), CoreError> {
        if self.status != OrderStatus::Processing {
            return Err(CoreError::InvalidInput(
                "trade_ref".to_string(),
                format!("order {} is {}, not processing", self.id, self.status),
            ));
        }
        self.trade_ref = Some(trade_ref);
        Ok(())
    }

    /// `processing -> completed`.
    pub fn complete(&mut self, settlement_ref: String) -> Result<(), CoreError> {
        self.transition(OrderStatus::Completed)?;
        self.settlement_ref = Some(settlement_ref);
        Ok(())
    }

    /// `processing -> failed`.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), CoreError> {
        self.transition(OrderStatus::Failed)?;
        self.error = Some(reason.into());
        Ok(())
    }

    /// `pending -> expired`.
    pub fn expire(&mut self) -> Result<(), CoreError> {
        self.transition(OrderStatus::Expired)
    }
}

/// Per-status order counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub expired: usize,
}

impl OrderStats {
    pub fn record(&mut self, status: OrderStatus) {
        self.total += 1;
        match status {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::Processing => self.processing += 1,
            OrderStatus::Completed => self.completed += 1,
            OrderStatus::Failed => self.failed += 1,
            OrderStatus::Expired => self.expired += 1,
        }
    }
}
