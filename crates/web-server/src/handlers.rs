use crate::{error::AppError, AppState};
use axum::{
    extract::{Path, State},
    Json,
};
use core_types::OrderId;
use engine::{parse_amount, CreateOrderRequest};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// An amount sent either as a JSON string or a JSON number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Text(String),
    Number(serde_json::Number),
}

impl AmountField {
    fn parse(&self) -> Result<Decimal, AppError> {
        let raw = match self {
            AmountField::Text(text) => text.clone(),
            AmountField::Number(number) => number.to_string(),
        };
        Ok(parse_amount(&raw)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub from_token: Option<String>,
    pub to_token: Option<String>,
    pub amount: Option<AmountField>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSwapRequest {
    pub from_token: Option<String>,
    pub to_token: Option<String>,
    pub amount: Option<AmountField>,
    pub destination_address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateDepositRequest {
    pub order_id: Option<String>,
    pub amount: Option<AmountField>,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::BadRequest(format!("Missing required field: {}", field)))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, AppError> {
    required(value.filter(|v| !v.trim().is_empty()), field)
}

/// # POST /api/swap/quote
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Json(request): Json<QuoteRequest>,
) -> Result<Json<Value>, AppError> {
    let from = required_text(request.from_token, "fromToken")?;
    let to = required_text(request.to_token, "toToken")?;
    let amount = required(request.amount, "amount")?.parse()?;

    let quote = state.manager.quote(&from, &to, amount).await?;
    Ok(Json(json!({ "success": true, "quote": quote })))
}

/// # POST /api/swap/create
pub async fn create_swap(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateSwapRequest>,
) -> Result<Json<Value>, AppError> {
    let from = required_text(request.from_token, "fromToken")?;
    let to = required_text(request.to_token, "toToken")?;
    let amount = required(request.amount, "amount")?.parse()?;
    let destination_address = required_text(request.destination_address, "destinationAddress")?;

    let order = state
        .manager
        .create_order(CreateOrderRequest {
            source_asset: from,
            dest_asset: to,
            source_amount: amount,
            destination_address,
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "orderId": order.id,
        "depositAddress": order.deposit_address,
        "depositNetwork": order.deposit_network,
        "depositMemo": order.deposit_memo,
        "destinationAddress": order.destination_address,
        "fromToken": order.source_asset,
        "toToken": order.dest_asset,
        "fromAmount": order.source_amount,
        "toAmount": order.dest_amount,
        "status": order.status,
        "expiresAt": order.expires_at,
    })))
}

/// # GET /api/swap/status/:id
pub async fn get_order_status(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, AppError> {
    let order = state.manager.order_status(&OrderId::from(id)).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

/// # POST /api/swap/monitor-deposits
/// Checks for the order's deposit and executes the swap when it has arrived.
pub async fn monitor_deposits(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<Value>, AppError> {
    let id = OrderId::from(required_text(request.order_id, "orderId")?);
    let poll = state.manager.poll_deposit(&id).await?;

    Ok(Json(json!({
        "success": true,
        "orderId": id,
        "hasDeposit": poll.has_deposit,
        "depositAmount": poll.deposit_amount,
        "depositTxHash": poll.deposit_tx_ref,
        "settlementRef": poll.settlement_ref,
        "status": poll.status,
        "error": poll.error,
    })))
}

/// # POST /api/swap/execute
/// Executes a pending order whose deposit the exchange has confirmed.
/// Answers 409 while no qualifying deposit has been observed.
pub async fn execute_swap(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrderRequest>,
) -> Result<Json<Value>, AppError> {
    let id = OrderId::from(required_text(request.order_id, "orderId")?);
    let order = state.manager.execute(&id, None).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

/// # GET /api/debug/orders
pub async fn list_orders(State(state): State<Arc<AppState>>) -> Json<Value> {
    let listing = state.manager.list_orders().await;
    Json(json!({
        "success": true,
        "totalOrders": listing.orders.len(),
        "stats": listing.stats,
        "orders": listing.orders,
    }))
}

/// # POST /api/swap/simulate-deposit
/// Credits a confirmed deposit to the order's address. Only available when
/// the simulated gateway is in use.
pub async fn simulate_deposit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SimulateDepositRequest>,
) -> Result<Json<Value>, AppError> {
    let simulator = state.simulator.as_ref().ok_or_else(|| {
        AppError::NotFound("Deposit simulation is only available with the simulated gateway".to_string())
    })?;
    let id = OrderId::from(required_text(request.order_id, "orderId")?);
    let order = state.manager.order_status(&id).await?;
    let amount = match request.amount {
        Some(amount) => amount.parse()?,
        None => order.source_amount,
    };

    let tx_ref = simulator
        .credit_deposit(&order.source_asset, &order.deposit_address, amount)
        .await;
    Ok(Json(json!({
        "success": true,
        "orderId": order.id,
        "depositAddress": order.deposit_address,
        "amount": amount,
        "txHash": tx_ref,
    })))
}
