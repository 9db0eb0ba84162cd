use crate::auth::sign_request;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use configuration::GatewayConfig;
use core_types::{
    DepositAddress, DepositFilter, DepositRecord, DepositStatus, MarketOrder, TradeReceipt,
    TradeSide, TradingPair, WithdrawalReceipt,
};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

mod auth;
pub mod error;
pub mod responses;
pub mod simulated;
// --- Public API ---
pub use error::ApiError;
pub use responses::{
    ApiErrorResponse, CoinConfigResponse, DepositAddressResponse, DepositHistoryEntry,
    OrderResponse, TickerPriceResponse, WithdrawResponse,
};
pub use simulated::SimulatedGateway;

use responses::OneOrMany;

/// MEXC's deposit history status for a credited deposit.
const CONFIRMED_DEPOSIT_STATUS: i32 = 1;
/// MEXC's error code for a symbol it does not list.
const INVALID_SYMBOL_CODE: i64 = -1121;

/// Maps a failed MEXC response to an `ApiError`.
///
/// Unlisted symbols become `UnknownSymbol` so callers can tell a missing
/// market apart from an exchange outage; everything else is `Upstream`.
fn classify_error(status: StatusCode, body: String) -> ApiError {
    match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_error) if api_error.code == INVALID_SYMBOL_CODE => ApiError::UnknownSymbol(api_error.msg),
        Ok(api_error)
            if status == StatusCode::BAD_REQUEST
                && api_error.msg.to_lowercase().contains("invalid symbol") =>
        {
            ApiError::UnknownSymbol(api_error.msg)
        }
        Ok(api_error) => ApiError::Upstream {
            status: status.as_u16(),
            message: format!("{} (code {})", api_error.msg, api_error.code),
        },
        Err(_) => ApiError::Upstream {
            status: status.as_u16(),
            message: body,
        },
    }
}

fn deposit_status(code: i32) -> DepositStatus {
    if code == CONFIRMED_DEPOSIT_STATUS {
        DepositStatus::Confirmed
    } else {
        DepositStatus::Pending
    }
}

/// The abstract interface to the exchange that prices, custodies, trades and
/// pays out swaps. The lifecycle manager only ever talks to this trait, so the
/// live MEXC client and the simulated gateway are interchangeable.
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Current price of `pair`, in quote units per base unit.
    async fn get_price(&self, pair: &TradingPair) -> Result<Decimal, ApiError>;

    /// Issues a deposit address for `asset`. (Authenticated)
    async fn get_deposit_address(&self, asset: &str) -> Result<DepositAddress, ApiError>;

    /// Deposit history for `asset`, narrowed by `filter`. (Authenticated)
    async fn list_deposits(
        &self,
        asset: &str,
        filter: &DepositFilter,
    ) -> Result<Vec<DepositRecord>, ApiError>;

    /// Places a market order on the exchange. (Authenticated)
    async fn place_market_order(&self, order: &MarketOrder) -> Result<TradeReceipt, ApiError>;

    /// Sends `amount` of `asset` to an external `address`. (Authenticated)
    async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        amount: Decimal,
    ) -> Result<WithdrawalReceipt, ApiError>;
}

/// Which capability a coin network must have enabled.
#[derive(Debug, Clone, Copy)]
enum NetworkUse {
    Deposit,
    Withdraw,
}

/// A concrete implementation of the `ExchangeGateway` for the MEXC spot API.
#[derive(Clone)]
pub struct MexcClient {
    client: reqwest::Client,
    base_url: String,

    api_secret: String,
}

impl MexcClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-MEXC-APIKEY",
            HeaderValue::from_str(&config.api_key)
                .map_err(|e| ApiError::InvalidData(format!("Invalid API key: {}", e)))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .user_agent("swapdesk/0.1")
                .build()?,
            base_url: format!("{}/api/v3", config.base_url.trim_end_matches('/')),

            api_secret: config.api_secret.clone(),
        })
    }

    async fn send_signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &mut BTreeMap<&str, String>,
    ) -> Result<T, ApiError> {
        params.insert("timestamp", Utc::now().timestamp_millis().to_string());

        let query_string =
            serde_qs::to_string(params).map_err(|e| ApiError::InvalidData(e.to_string()))?;
        let signature = sign_request(&self.api_secret, &query_string);

        let url = format!(
            "{}{}?{}&signature={}",
            self.base_url, path, query_string, signature
        );

        tracing::debug!(%method, path, "Sending signed MEXC request.");
        let response = self.client.request(method, &url).send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            return serde_json::from_str::<T>(&text)
                .map_err(|e| ApiError::Deserialization(format!("{}. Original text: {}", e, text)));
        }
        Err(classify_error(status, text))
    }

    /// Picks the first network of `coin` with the required capability enabled,
    /// falling back to the first listed network.
    async fn network_for_coin(&self, coin: &str, purpose: NetworkUse) -> Result<String, ApiError> {
        let mut params = BTreeMap::new();
        let coins: Vec<CoinConfigResponse> = self
            .send_signed(Method::GET, "/capital/config/getall", &mut params)
            .await?;

        let networks = coins
            .into_iter()
            .find(|c| c.coin.eq_ignore_ascii_case(coin))
            .map(|c| c.network_list)
            .unwrap_or_default();

        let enabled = networks.iter().find(|n| match purpose {
            NetworkUse::Deposit => n.deposit_enable,
            NetworkUse::Withdraw => n.withdraw_enable,
        });

        enabled
            .or_else(|| networks.first())
            .map(|n| n.network.clone())
            .ok_or_else(|| ApiError::NoNetwork(coin.to_string()))
    }
}

#[async_trait]
impl ExchangeGateway for MexcClient {
    async fn get_price(&self, pair: &TradingPair) -> Result<Decimal, ApiError> {
        let url = format!("{}/ticker/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", pair.symbol())])
            .send()
            .await?;

        let ticker: TickerPriceResponse = Self::parse_response(response)
            .await
            .map_err(|e| match e {
                ApiError::UnknownSymbol(_) => ApiError::UnknownSymbol(pair.symbol()),
                other => other,
            })?;
        Ok(ticker.price)
    }

    async fn get_deposit_address(&self, asset: &str) -> Result<DepositAddress, ApiError> {
        let network = self.network_for_coin(asset, NetworkUse::Deposit).await?;

        let mut params = BTreeMap::new();
        params.insert("coin", asset.to_string());
        params.insert("network", network.clone());
        let response: OneOrMany<DepositAddressResponse> = self
            .send_signed(Method::POST, "/capital/deposit/address", &mut params)
            .await?;

        let issued = response
            .into_first()
            .filter(|a| !a.address.is_empty())
            .ok_or_else(|| ApiError::InvalidData(format!("No deposit address returned for {}", asset)))?;

        Ok(DepositAddress {
            address: issued.address,
            network: issued.network.unwrap_or(network),
            memo: issued.memo.filter(|m| !m.is_empty()),
        })
    }

    async fn list_deposits(
        &self,
        asset: &str,
        filter: &DepositFilter,
    ) -> Result<Vec<DepositRecord>, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("coin", asset.to_string());
        params.insert("limit", "100".to_string());
        if filter.status == Some(DepositStatus::Confirmed) {
            params.insert("status", CONFIRMED_DEPOSIT_STATUS.to_string());
        }
        if let Some(since) = filter.since {
            params.insert("startTime", since.timestamp_millis().to_string());
        }

        let entries: Vec<DepositHistoryEntry> = self
            .send_signed(Method::GET, "/capital/deposit/hisrec", &mut params)
            .await?;

        let records = entries
            .into_iter()
            .map(|entry| DepositRecord {
                address: entry.address,
                amount: entry.amount,
                status: deposit_status(entry.status),
                tx_ref: entry.tx_id.unwrap_or_default(),
                inserted_at: entry
                    .insert_time
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            })
            .filter(|record| filter.matches(record))
            .collect();

        Ok(records)
    }

    async fn place_market_order(&self, order: &MarketOrder) -> Result<TradeReceipt, ApiError> {
        let mut params = BTreeMap::new();
        params.insert("symbol", order.pair.symbol());
        params.insert("side", format!("{:?}", order.side).to_uppercase());
        params.insert("type", "MARKET".to_string());
        // Sells are sized in base units, buys by the quote amount spent.
        match order.side {
            TradeSide::Sell => params.insert("quantity", order.quantity.normalize().to_string()),
            TradeSide::Buy => params.insert("quoteOrderQty", order.quantity.normalize().to_string()),
        };
        params.insert("newClientOrderId", order.client_order_id.clone());

        let response: OrderResponse = self.send_signed(Method::POST, "/order", &mut params).await?;

        let received = match order.side {
            TradeSide::Sell => response.cummulative_quote_qty,
            TradeSide::Buy => response.executed_qty,
        }
        .filter(|qty| !qty.is_zero());

        Ok(TradeReceipt {
            settlement_ref: response.order_id,
            received,
        })
    }

    async fn withdraw(
        &self,
        asset: &str,
        address: &str,
        amount: Decimal,
    ) -> Result<WithdrawalReceipt, ApiError> {
        let network = self.network_for_coin(asset, NetworkUse::Withdraw).await?;

        let mut params = BTreeMap::new();
        params.insert("coin", asset.to_string());
        params.insert("address", address.to_string());
        params.insert("amount", amount.normalize().to_string());
        params.insert("network", network);

        let response: WithdrawResponse = self
            .send_signed(Method::POST, "/capital/withdraw/apply", &mut params)
            .await?;

        Ok(WithdrawalReceipt {
            settlement_ref: response.id,
        })
    }
}
