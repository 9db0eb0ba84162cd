use rust_decimal::Decimal;
use serde::Deserialize;

// MEXC uses camelCase JSON; `rename_all` maps it onto snake_case fields.

/// `GET /api/v3/ticker/price`.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerPriceResponse {
    pub symbol: String,
    pub price: Decimal,
}

/// One coin entry of `GET /api/v3/capital/config/getall`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinConfigResponse {
    pub coin: String,
    #[serde(default)]
    pub network_list: Vec<CoinNetwork>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinNetwork {
    pub network: String,
    #[serde(default)]
    pub deposit_enable: bool,
    #[serde(default)]
    pub withdraw_enable: bool,
}

/// `POST /api/v3/capital/deposit/address`.
#[derive(Debug, Clone, Deserialize)]
pub struct DepositAddressResponse {
    pub coin: Option<String>,
    pub network: Option<String>,
    pub address: String,
    pub memo: Option<String>,
}

/// One entry of `GET /api/v3/capital/deposit/hisrec`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositHistoryEntry {
    pub amount: Decimal,
    pub coin: String,
    pub address: String,
    pub status: i32,
    pub tx_id: Option<String>,
    /// Milliseconds since the epoch.
    pub insert_time: Option<i64>,
}

/// The response from a successful `POST /api/v3/order` request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: String,
    pub executed_qty: Option<Decimal>,
    pub cummulative_quote_qty: Option<Decimal>,
    // There are more fields, but these are the ones the swap flow reads.
}

/// `POST /api/v3/capital/withdraw/apply`.
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawResponse {
    pub id: String,
}

/// Represents an error response from the MEXC API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: i64,
    pub msg: String,
}

/// Some MEXC endpoints answer with a single object, others with a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}
