use crate::error::AlerterError;
use configuration::TelegramConfig;
use events::SwapEvent;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::broadcast;
pub mod error;

/// The JSON payload for the Telegram `sendMessage` endpoint.
#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str, // To allow for formatting like bold, italics etc.
}

/// A client for sending messages to the Telegram Bot API.
pub struct TelegramAlerter {
    client: Client,
    token: String,
    chat_id: String,
}

impl TelegramAlerter {
    /// Creates a new `TelegramAlerter`.
    ///
    /// Returns `None` if the token or chat_id is missing from the configuration,
    /// allowing the system to gracefully disable alerting.
    pub fn new(config: &TelegramConfig) -> Option<Self> {
        if config.token.is_empty() || config.chat_id.is_empty() {
            tracing::warn!("Telegram alerter is not configured (missing token or chat_id).");
            return None;
        }
        Some(Self {
            client: Client::new(),
            token: config.token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }

    /// Sends a text message to the configured Telegram chat.
    pub async fn send_message(&self, message: &str) -> Result<(), AlerterError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);

        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text: message,
            parse_mode: "MarkdownV2",
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        if !response.status().is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to decode error response".to_string());
            return Err(AlerterError::ApiError(error_text));
        }

        Ok(())
    }
}

/// The operator message for `event`, if it deserves one.
///
/// Failed orders always alert since funds may be in flight. Completed orders
/// get a short confirmation. Everything else is left to the logs.
pub fn format_alert(event: &SwapEvent) -> Option<String> {
    match event {
        SwapEvent::OrderFailed {
            order,
            error,
            trade_ref,
        } => {
            let trade = match trade_ref {
                Some(trade_ref) => format!("\nTrade: `{}`", escape_markdown(trade_ref)),
                None => String::new(),
            };
            Some(format!(
                "🚨 *Swap failed, manual action required*\nOrder: `{}`\n{} {} → {} {}\nTo: `{}`\nError: {}{}",
                escape_markdown(order.order_id.as_str()),
                escape_markdown(&order.source_amount.to_string()),
                escape_markdown(&order.source_asset),
                escape_markdown(&order.dest_amount.to_string()),
                escape_markdown(&order.dest_asset),
                escape_markdown(&order.destination_address),
                escape_markdown(error),
                trade
            ))
        }
        SwapEvent::OrderCompleted {
            order,
            settlement_ref,
        } => Some(format!(
            "✅ *Swap completed*\nOrder: `{}`\n{} {} → {} {}\nSettlement: `{}`",
            escape_markdown(order.order_id.as_str()),
            escape_markdown(&order.source_amount.to_string()),
            escape_markdown(&order.source_asset),
            escape_markdown(&order.dest_amount.to_string()),
            escape_markdown(&order.dest_asset),
            escape_markdown(settlement_ref)
        )),
        _ => None,
    }
}

/// A long-running service that listens to the broadcast channel of `SwapEvent`s
/// and sends Telegram alerts for the ones operators must see.
pub async fn run_alerter_service(
    alerter: TelegramAlerter,
    mut event_rx: broadcast::Receiver<SwapEvent>,
) {
    tracing::info!("Alerter service started. Listening for order events.");

    // Send a startup message
    let _ = alerter.send_message("✅ *Swapdesk Started*").await;

    loop {
        match event_rx.recv().await {
            Ok(event) => {
                if let Some(msg) = format_alert(&event) {
                    if let Err(e) = alerter.send_message(&msg).await {
                        tracing::error!(error = ?e, order_id = %event.order().order_id, "Failed to send Telegram alert.");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Alerter service lagged, skipped {} messages.", n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::info!("Event channel closed. Alerter service shutting down.");
                break;
            }
        }
    }
}

/// A helper function to escape characters that have special meaning in Telegram's MarkdownV2.
fn escape_markdown(text: &str) -> String {
    let special_chars = r"_*[]()~`>#+-=|{}.!";
    special_chars
        .chars()
        .fold(text.to_string(), |s, c| s.replace(c, &format!("\\{}", c)))
}
