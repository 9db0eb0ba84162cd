use crate::clock::{Clock, SystemClock};
use crate::error::EngineError;
use crate::quote::{AMOUNT_SCALE, QuoteEngine, deduct_fee, ensure_positive};
use crate::store::OrderStore;
use crate::util::bounded;
use crate::validation::{normalize_asset, validate_destination_address};
use api_client::ExchangeGateway;
use configuration::SwapSettings;
use core_types::{
    DepositFilter, DepositMatch, DepositStatus, MarketOrder, NewOrder, Order, OrderId, OrderStats,
    OrderStatus, Quote, TradeSide,
};
use events::{OrderSnapshot, SwapEvent};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Deposits credited this long before an order was created still count for it.
const DEPOSIT_CLOCK_SKEW_SECS: i64 = 300;
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A request to open a swap order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub source_asset: String,
    pub dest_asset: String,
    pub source_amount: Decimal,
    pub destination_address: String,
}

/// Result of looking for a qualifying deposit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositCheck {
    pub found: bool,
    pub amount: Option<Decimal>,
    pub tx_ref: Option<String>,
}

impl DepositCheck {
    pub fn into_match(self) -> Option<DepositMatch> {
        match (self.found, self.amount) {
            (true, Some(amount)) => Some(DepositMatch {
                amount,
                tx_ref: self.tx_ref,
            }),
            _ => None,
        }
    }
}

/// Outcome of an on-demand deposit poll.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositPoll {
    pub has_deposit: bool,
    pub deposit_amount: Option<Decimal>,
    pub deposit_tx_ref: Option<String>,
    pub settlement_ref: Option<String>,
    pub status: OrderStatus,
    pub error: Option<String>,
}

impl DepositPoll {
    fn of(order: &Order) -> Self {
        Self {
            has_deposit: order.deposit.is_some(),
            deposit_amount: order.deposit.as_ref().map(|d| d.amount),
            deposit_tx_ref: order.deposit.as_ref().and_then(|d| d.tx_ref.clone()),
            settlement_ref: order.settlement_ref.clone(),
            status: order.status,
            error: order.error.clone(),
        }
    }
}

/// Every order plus per-status counts.
#[derive(Debug, Clone, Serialize)]
pub struct OrderListing {
    pub stats: OrderStats,
    pub orders: Vec<Order>,
}

/// Orchestrates swap orders from creation to a terminal state.
///
/// All state lives in the injected `OrderStore`; the manager owns the
/// transition rules and the calls into the exchange gateway.
pub struct SwapManager {
    store: Arc<OrderStore>,
    gateway: Arc<dyn ExchangeGateway>,
    quotes: QuoteEngine,
    clock: Arc<dyn Clock>,
    order_ttl: chrono::Duration,
    gateway_timeout: Duration,
    events: broadcast::Sender<SwapEvent>,
}

impl SwapManager {
    pub fn new(
        store: Arc<OrderStore>,
        gateway: Arc<dyn ExchangeGateway>,
        settings: &SwapSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            quotes: QuoteEngine::new(
                Arc::clone(&gateway),
                settings.fee_rate,
                settings.gateway_timeout(),
            ),
            store,
            gateway,
            clock: Arc::new(SystemClock),
            order_ttl: settings.order_ttl(),
            gateway_timeout: settings.gateway_timeout(),
            events,
        }
    }

    /// Replaces the wall clock, e.g. with a `ManualClock` in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    /// A receiver for every order transition published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SwapEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: SwapEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn snapshot(&self, order: &Order) -> OrderSnapshot {
        OrderSnapshot::of(order, self.clock.now())
    }

    pub async fn quote(
        &self,
        source_asset: &str,
        dest_asset: &str,
        amount: Decimal,
    ) -> Result<Quote, EngineError> {
        let source = normalize_asset(source_asset)?;
        let dest = normalize_asset(dest_asset)?;
        self.quotes.quote(&source, &dest, amount).await
    }

    /// Validates the request, quotes it, obtains a deposit address and stores
    /// a new `pending` order. Nothing is stored if any step fails.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, EngineError> {
        let source = normalize_asset(&request.source_asset)?;
        let dest = normalize_asset(&request.dest_asset)?;
        ensure_positive(request.source_amount)?;
        let destination_address = request.destination_address.trim().to_string();
        validate_destination_address(&dest, &destination_address)?;

        let quote = self.quotes.quote(&source, &dest, request.source_amount).await?;
        let deposit = bounded(
            "get_deposit_address",
            self.gateway_timeout,
            self.gateway.get_deposit_address(&source),
        )
        .await?;

        let order = Order::open(
            NewOrder {
                source_asset: source,
                dest_asset: dest,
                source_amount: request.source_amount,
                dest_amount: quote.dest_amount,
                deposit,
                destination_address,
            },
            self.clock.now(),
            self.order_ttl,
        );
        self.store.create(order.clone()).await?;

        tracing::info!(
            order_id = %order.id,
            pair = %format!("{}/{}", order.source_asset, order.dest_asset),
            source_amount = %order.source_amount,
            dest_amount = %order.dest_amount,
            expires_at = %order.expires_at,
            "Swap order created."
        );
        self.publish(SwapEvent::OrderCreated {
            order: self.snapshot(&order),
        });
        Ok(order)
    }

    /// The latest state of an order, with expiry applied first.
    pub async fn order_status(&self, id: &OrderId) -> Result<Order, EngineError> {
        self.check_expiry(id).await?;
        self.store
            .get(id)
            .await
            .ok_or_else(|| EngineError::NotFound(id.clone()))
    }

    /// Moves a stale `pending` order to `expired`. Returns whether it did.
    pub async fn check_expiry(&self, id: &OrderId) -> Result<bool, EngineError> {
        let now = self.clock.now();
        let expired = self
            .store
            .update(id, |order| {
                if !order.is_stale(now) {
                    return Ok(None);
                }
                order.expire()?;
                Ok(Some(order.clone()))
            })
            .await?;

        match expired {
            Some(order) => {
                tracing::info!(order_id = %order.id, expires_at = %order.expires_at, "Swap order expired.");
                self.publish(SwapEvent::OrderExpired {
                    order: self.snapshot(&order),
                });
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Expires every stale `pending` order and returns their ids.
    pub async fn expire_stale(&self) -> Vec<OrderId> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for order in self.store.list_by_status(OrderStatus::Pending).await {
            if !order.is_stale(now) {
                continue;
            }
            match self.check_expiry(&order.id).await {
                Ok(true) => expired.push(order.id),
                Ok(false) => {}
                Err(e) => tracing::warn!(order_id = %order.id, error = %e, "Failed to expire order."),
            }
        }
        expired
    }

    /// Looks for a confirmed deposit of at least `source_amount` to the
    /// order's address. Orders that are no longer `pending` report nothing.
    pub async fn check_deposit(&self, id: &OrderId) -> Result<DepositCheck, EngineError> {
        let order = self
            .store
            .get(id)
            .await
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        if order.status != OrderStatus::Pending {
            return Ok(DepositCheck::default());
        }

        let filter = DepositFilter {
            address: Some(order.deposit_address.clone()),
            status: Some(DepositStatus::Confirmed),
            since: Some(order.created_at - chrono::Duration::seconds(DEPOSIT_CLOCK_SKEW_SECS)),
        };
        let deposits = bounded(
            "list_deposits",
            self.gateway_timeout,
            self.gateway.list_deposits(&order.source_asset, &filter),
        )
        .await?;

        let relevant = deposits.iter().filter(|record| filter.matches(record));
        let mut shortfall = None;
        for record in relevant {
            if record.amount >= order.source_amount {
                tracing::info!(order_id = %order.id, amount = %record.amount, tx_ref = %record.tx_ref, "Deposit found.");
                return Ok(DepositCheck {
                    found: true,
                    amount: Some(record.amount),
                    tx_ref: Some(record.tx_ref.clone()).filter(|tx| !tx.is_empty()),
                });
            }
            shortfall = Some(record.amount);
        }

        if let Some(amount) = shortfall {
            tracing::warn!(
                order_id = %order.id,
                received = %amount,
                expected = %order.source_amount,
                "Deposit below the order amount, still waiting."
            );
        }
        Ok(DepositCheck::default())
    }

    /// Trades the deposit and pays out `dest_amount`.
    ///
    /// Only a `pending` order can be executed; the pending check and the move
    /// to `processing` happen in one critical section, so concurrent callers
    /// cannot both get past it. Once processing, any failure is terminal.
    /// When no `deposit` is passed the gateway is asked for one, and the call
    /// is refused with `AwaitingDeposit` unless a qualifying deposit exists.
    pub async fn execute(
        &self,
        id: &OrderId,
        deposit: Option<DepositMatch>,
    ) -> Result<Order, EngineError> {
        self.check_expiry(id).await?;
        let deposit = match deposit {
            Some(deposit) => deposit,
            None => self.observed_deposit(id).await?,
        };
        let deposit_amount = deposit.amount;

        let order = self
            .store
            .update(id, |order| {
                if order.status != OrderStatus::Pending {
                    return Err(EngineError::InvalidState {
                        order_id: order.id.clone(),
                        status: order.status,
                        operation: "execute",
                    });
                }
                order.begin_processing(deposit)?;
                Ok(order.clone())
            })
            .await?;

        tracing::info!(order_id = %order.id, %deposit_amount, "Executing swap order.");
        self.publish(SwapEvent::OrderProcessing {
            order: self.snapshot(&order),
            deposit_amount,
        });

        match self.settle(&order, deposit_amount).await {
            Ok(settlement_ref) => {
                let completed = self
                    .store
                    .update(id, |o| {
                        o.complete(settlement_ref.clone())?;
                        Ok(o.clone())
                    })
                    .await?;
                tracing::info!(order_id = %id, %settlement_ref, "Swap order completed.");
                self.publish(SwapEvent::OrderCompleted {
                    order: self.snapshot(&completed),
                    settlement_ref,
                });
                Ok(completed)
            }
            Err(cause) => {
                let reason = match &cause {
                    EngineError::Gateway(e) => e.to_string(),
                    other => other.to_string(),
                };
                let failed = self
                    .store
                    .update(id, |o| {
                        o.fail(reason.clone())?;
                        Ok(o.clone())
                    })
                    .await?;
                tracing::error!(
                    order_id = %id,
                    error = %reason,
                    trade_ref = ?failed.trade_ref,
                    "Swap order failed; manual intervention required."
                );
                self.publish(SwapEvent::OrderFailed {
                    order: self.snapshot(&failed),
                    error: reason.clone(),
                    trade_ref: failed.trade_ref.clone(),
                });
                Err(EngineError::ExecutionFailed {
                    order_id: id.clone(),
                    reason,
                })
            }
        }
    }

    async fn observed_deposit(&self, id: &OrderId) -> Result<DepositMatch, EngineError> {
        let order = self
            .store
            .get(id)
            .await
            .ok_or_else(|| EngineError::NotFound(id.clone()))?;
        if order.status != OrderStatus::Pending {
            return Err(EngineError::InvalidState {
                order_id: order.id,
                status: order.status,
                operation: "execute",
            });
        }
        self.check_deposit(id)
            .await?
            .into_match()
            .ok_or_else(|| EngineError::AwaitingDeposit(id.clone()))
    }

    /// Market order then withdrawal. Returns the withdrawal reference.
    async fn settle(&self, order: &Order, deposit_amount: Decimal) -> Result<String, EngineError> {
        let (net, _) = deduct_fee(deposit_amount, self.quotes.fee_rate())?;
        let market = self
            .quotes
            .resolve_market(&order.source_asset, &order.dest_asset)
            .await?;
        // Selling the source on SRC/DST, or spending it as quote currency on DST/SRC.
        let side = if market.inverted {
            TradeSide::Buy
        } else {
            TradeSide::Sell
        };
        let market_order = MarketOrder {
            pair: market.pair.clone(),
            side,
            quantity: net,
            client_order_id: order.id.to_string(),
        };

        tracing::debug!(order_id = %order.id, pair = %market.pair, ?side, quantity = %net, "Placing market order.");
        let trade = bounded(
            "place_market_order",
            self.gateway_timeout,
            self.gateway.place_market_order(&market_order),
        )
        .await?;

        let trade_ref = trade.settlement_ref.clone();
        self.store
            .update(&order.id, |o| Ok(o.record_trade(trade_ref.clone())?))
            .await?;

        if let Some(received) = trade.received {
            if received.round_dp(AMOUNT_SCALE) != order.dest_amount {
                tracing::warn!(
                    order_id = %order.id,
                    quoted = %order.dest_amount,
                    %received,
                    "Realized trade amount differs from the quoted amount; paying out the quote."
                );
            }
        }

        let withdrawal = bounded(
            "withdraw",
            self.gateway_timeout,
            self.gateway
                .withdraw(&order.dest_asset, &order.destination_address, order.dest_amount),
        )
        .await?;
        Ok(withdrawal.settlement_ref)
    }

    /// On-demand deposit check that executes the order when the deposit is there.
    pub async fn poll_deposit(&self, id: &OrderId) -> Result<DepositPoll, EngineError> {
        let order = self.order_status(id).await?;
        if order.status != OrderStatus::Pending {
            return Ok(DepositPoll::of(&order));
        }

        let Some(deposit) = self.check_deposit(id).await?.into_match() else {
            return Ok(DepositPoll::of(&order));
        };

        match self.execute(id, Some(deposit)).await {
            Ok(order) => Ok(DepositPoll::of(&order)),
            // Failed orders and lost races are reported through the stored state.
            Err(EngineError::ExecutionFailed { .. }) | Err(EngineError::InvalidState { .. }) => {
                let order = self
                    .store
                    .get(id)
                    .await
                    .ok_or_else(|| EngineError::NotFound(id.clone()))?;
                Ok(DepositPoll::of(&order))
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_orders(&self) -> OrderListing {
        let orders = self.store.all().await;
        let stats = self.store.stats().await;
        OrderListing { stats, orders }
    }
}
