use crate::error::ApiError;
use crate::ExchangeGateway;
use async_trait::async_trait;
use chrono::Utc;
use configuration::SimulationConfig;
use core_types::{
    DepositAddress, DepositFilter, DepositRecord, DepositStatus, MarketOrder, TradeReceipt,
    TradeSide, TradingPair, WithdrawalReceipt,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

/// An in-memory stand-in for the exchange, used for demos and tests.
///
/// Prices come from a fixed table, every deposit address is freshly generated,
/// and deposits only appear when `credit_deposit` is called. Market orders
/// fill instantly at the table price.
pub struct SimulatedGateway {
    prices: HashMap<String, Decimal>,
    deposits: Mutex<Vec<(String, DepositRecord)>>,
    sequence: AtomicU64,
}

impl SimulatedGateway {
    pub fn new(config: &SimulationConfig) -> Self {
        let prices = config
            .prices
            .iter()
            .map(|(symbol, price)| (symbol.to_uppercase(), *price))
            .collect();
        Self {
            prices,
            deposits: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(1),
        }
    }

    fn next_ref(&self, prefix: &str) -> String {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{}_{:06}", prefix, n)
    }

    fn price_of(&self, pair: &TradingPair) -> Result<Decimal, ApiError> {
        self.prices
            .get(&pair.symbol().to_uppercase())
            .copied()
            .ok_or_else(|| ApiError::UnknownSymbol(pair.symbol()))
    }

    /// Records a confirmed deposit of `amount` to `address`, as if it had
    /// just been credited on-chain. Returns the synthetic transaction id.
    pub async fn credit_deposit(&self, asset: &str, address: &str, amount: Decimal) -> String {
        let tx_ref = self.next_ref("SIMTX");
        let record = DepositRecord {
            address: address.to_string(),
            amount,
            status: DepositStatus::Confirmed,
            tx_ref: tx_ref.clone(),
            inserted_at: Some(Utc::now()),
        };
        self.deposits.lock().await.push((asset.to_uppercase(), record));
        tracing::info!(asset, address, %amount, "Simulated deposit credited.");
        tx_ref
    }
}

#[async_trait]
impl ExchangeGateway for SimulatedGateway {
    async fn get_price(&self, pair: &TradingPair) -> Result<Decimal, ApiError> {
        self.price_of(pair)
    }

    async fn get_deposit_address(&self, asset: &str) -> Result<DepositAddress, ApiError> {
        Ok(DepositAddress {
            address: format!("sim{}{}", asset.to_lowercase(), Uuid::new_v4().simple()),
            network: asset.to_uppercase(),
            memo: None,
        })
    }

    async fn list_deposits(
        &self,
        asset: &str,
        filter: &DepositFilter,
    ) -> Result<Vec<DepositRecord>, ApiError> {
        let asset = asset.to_uppercase();
        let deposits = self.deposits.lock().await;
        Ok(deposits
            .iter()
            .filter(|(coin, record)| *coin == asset && filter.matches(record))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<TradeReceipt, ApiError> {
        let price = self.price_of(&order.pair)?;
        if order.quantity <= Decimal::ZERO {
            return Err(ApiError::Upstream {
                status: 400,
                message: format!("Invalid quantity {}", order.quantity),
            });
        }
        let received = match order.side {
            TradeSide::Sell => order.quantity * price,
            TradeSide::Buy => order.quantity / price,
        };
        Ok(TradeReceipt {
            settlement_ref: self.next_ref("SIMTRADE"),
            received: Some(received),
        })
    }

    async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        amount: Decimal,
    ) -> Result<WithdrawalReceipt, ApiError> {
        tracing::info!(asset, address, %amount, "Simulated withdrawal sent.");
        Ok(WithdrawalReceipt {
            settlement_ref: self.next_ref("SIMWD"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gateway() -> SimulatedGateway {
        SimulatedGateway::new(&SimulationConfig {
            prices: HashMap::from([("btcusdt".to_string(), dec!(60000))]),
        })
    }

    #[tokio::test]
    async fn prices_are_looked_up_case_insensitively() {
        let gw = gateway();
        assert_eq!(gw.get_price(&TradingPair::new("BTC", "USDT")).await.unwrap(), dec!(60000));
        let err = gw.get_price(&TradingPair::new("USDT", "BTC")).await.unwrap_err();
        assert!(err.is_unknown_symbol());
    }

    #[tokio::test]
    async fn deposit_addresses_are_unique() {
        let gw = gateway();
        let a = gw.get_deposit_address("BTC").await.unwrap();
        let b = gw.get_deposit_address("BTC").await.unwrap();
        assert_ne!(a.address, b.address);
    }

    #[tokio::test]
    async fn credited_deposits_are_filtered_by_address() {
        let gw = gateway();
        gw.credit_deposit("BTC", "addr-1", dec!(0.5)).await;
        gw.credit_deposit("BTC", "addr-2", dec!(0.7)).await;
        gw.credit_deposit("ETH", "addr-1", dec!(2)).await;

        let filter = DepositFilter {
            address: Some("addr-1".to_string()),
            status: Some(DepositStatus::Confirmed),
            since: None,
        };
        let found = gw.list_deposits("BTC", &filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].amount, dec!(0.5));
    }

    #[tokio::test]
    async fn buys_and_sells_fill_at_table_price() {
        let gw = gateway();
        let pair = TradingPair::new("BTC", "USDT");
        let sell = MarketOrder {
            pair: pair.clone(),
            side: TradeSide::Sell,
            quantity: dec!(0.5),
            client_order_id: "a".to_string(),
        };
        let buy = MarketOrder { side: TradeSide::Buy, quantity: dec!(30000), ..sell.clone() };
        assert_eq!(gw.place_market_order(&sell).await.unwrap().received, Some(dec!(30000)));
        assert_eq!(gw.place_market_order(&buy).await.unwrap().received, Some(dec!(0.5)));
    }
}
