use crate::error::EngineError;
use crate::util::bounded;
use api_client::ExchangeGateway;
use core_types::{Quote, TradingPair};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Decimal places kept on quoted amounts and fees.
pub const AMOUNT_SCALE: u32 = 8;

/// The market a swap between two assets trades on.
#[derive(Debug, Clone, PartialEq)]
pub struct Market {
    pub pair: TradingPair,
    /// Price of `pair`, in quote units per base unit.
    pub price: Decimal,
    /// True when `pair` is `dest/source` rather than `source/dest`.
    pub inverted: bool,
}

impl Market {
    /// Converts `amount` of the source asset into destination units.
    pub fn convert(&self, amount: Decimal) -> Result<Decimal, EngineError> {
        let converted = if self.inverted {
            amount.checked_div(self.price)
        } else {
            amount.checked_mul(self.price)
        };
        converted.ok_or_else(|| out_of_range(amount))
    }
}

fn out_of_range(amount: Decimal) -> EngineError {
    EngineError::InvalidAmount(format!("amount {} is out of range", amount))
}

/// Takes the service fee off `amount`. Returns `(net, fee)`, both rounded
/// to `AMOUNT_SCALE` with trailing zeros dropped.
pub(crate) fn deduct_fee(amount: Decimal, fee_rate: Decimal) -> Result<(Decimal, Decimal), EngineError> {
    let fee = amount
        .checked_mul(fee_rate)
        .ok_or_else(|| out_of_range(amount))?;
    let net = amount.checked_sub(fee).ok_or_else(|| out_of_range(amount))?;
    Ok((
        net.round_dp(AMOUNT_SCALE).normalize(),
        fee.round_dp(AMOUNT_SCALE).normalize(),
    ))
}

/// Parses a user supplied amount, rejecting anything that is not a positive number.
pub fn parse_amount(raw: &str) -> Result<Decimal, EngineError> {
    let trimmed = raw.trim();
    let amount = Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| EngineError::InvalidAmount(format!("'{}' is not a number", raw)))?;
    ensure_positive(amount)?;
    Ok(amount)
}

pub(crate) fn ensure_positive(amount: Decimal) -> Result<(), EngineError> {
    if amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(format!(
            "amount must be greater than zero, got {}",
            amount
        )));
    }
    Ok(())
}

/// Prices swaps from the gateway's live ticker and the configured service fee.
///
/// Holds no order state; any number of callers may quote concurrently.
#[derive(Clone)]
pub struct QuoteEngine {
    gateway: Arc<dyn ExchangeGateway>,
    fee_rate: Decimal,
    timeout: Duration,
}

impl QuoteEngine {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, fee_rate: Decimal, timeout: Duration) -> Self {
        Self {
            gateway,
            fee_rate,
            timeout,
        }
    }

    pub fn fee_rate(&self) -> Decimal {
        self.fee_rate
    }

    /// Finds the market for `source -> dest`, preferring the direct pair.
    ///
    /// Falls back to the reverse pair only when the exchange does not list the
    /// direct one. Any other gateway failure is returned as is.
    pub async fn resolve_market(&self, source: &str, dest: &str) -> Result<Market, EngineError> {
        let direct = TradingPair::new(source, dest);
        match self.price_of(&direct).await {
            Ok(price) => {
                return Ok(Market {
                    pair: direct,
                    price,
                    inverted: false,
                });
            }
            Err(EngineError::Gateway(e)) if e.is_unknown_symbol() => {
                tracing::debug!(pair = %direct, "Direct pair not listed, trying reverse.");
            }
            Err(e) => return Err(e),
        }

        let reverse = direct.reversed();
        match self.price_of(&reverse).await {
            Ok(price) => Ok(Market {
                pair: reverse,
                price,
                inverted: true,
            }),
            Err(EngineError::Gateway(e)) if e.is_unknown_symbol() => Err(EngineError::NoMarket {
                source_asset: source.to_string(),
                dest_asset: dest.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    async fn price_of(&self, pair: &TradingPair) -> Result<Decimal, EngineError> {
        let price = bounded("get_price", self.timeout, self.gateway.get_price(pair)).await?;
        if price <= Decimal::ZERO {
            return Err(EngineError::Gateway(api_client::ApiError::InvalidData(format!(
                "non-positive price {} for {}",
                price,
                pair.symbol()
            ))));
        }
        Ok(price)
    }

    /// Whether either direction of `source/dest` is tradeable.
    pub async fn validate_pair(&self, source: &str, dest: &str) -> Result<bool, EngineError> {
        match self.resolve_market(source, dest).await {
            Ok(_) => Ok(true),
            Err(EngineError::NoMarket { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Quotes a swap of `amount` units of `source` into `dest`.
    pub async fn quote(&self, source: &str, dest: &str, amount: Decimal) -> Result<Quote, EngineError> {
        ensure_positive(amount)?;
        if source == dest {
            return Err(EngineError::Validation(format!(
                "cannot swap {} for itself",
                source
            )));
        }

        let market = self.resolve_market(source, dest).await?;
        let converted = market.convert(amount)?;
        let (dest_amount, fee) = deduct_fee(converted, self.fee_rate)?;

        Ok(Quote {
            source_asset: source.to_string(),
            dest_asset: dest.to_string(),
            source_amount: amount,
            dest_amount,
            rate: market.price,
            fee,
            pair: market.pair.symbol(),
            inverted: market.inverted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use api_client::SimulatedGateway;
    use configuration::SimulationConfig;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn engine(prices: &[(&str, Decimal)]) -> QuoteEngine {
        let gateway = SimulatedGateway::new(&SimulationConfig {
            prices: prices
                .iter()
                .map(|(symbol, price)| (symbol.to_string(), *price))
                .collect::<HashMap<_, _>>(),
        });
        QuoteEngine::new(Arc::new(gateway), dec!(0.003), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn direct_pair_multiplies() {
        let quote = engine(&[("BTCUSDT", dec!(60000))])
            .quote("BTC", "USDT", dec!(0.001))
            .await
            .unwrap();
        assert_eq!(quote.dest_amount, dec!(59.82));
        assert_eq!(quote.fee, dec!(0.18));
        assert_eq!(quote.rate, dec!(60000));
        assert_eq!(quote.pair, "BTCUSDT");
        assert!(!quote.inverted);
    }

    #[tokio::test]
    async fn reverse_pair_divides() {
        let quote = engine(&[("BTCUSDT", dec!(60000))])
            .quote("USDT", "BTC", dec!(60))
            .await
            .unwrap();
        assert!(quote.inverted);
        assert_eq!(quote.pair, "BTCUSDT");
        assert_eq!(quote.dest_amount, dec!(0.000997));
    }

    #[tokio::test]
    async fn missing_market_is_reported() {
        let err = engine(&[("BTCUSDT", dec!(60000))])
            .quote("DOGE", "ADA", dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NoMarket { .. }));
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected() {
        let engine = engine(&[("BTCUSDT", dec!(60000))]);
        for amount in [dec!(0), dec!(-1)] {
            let err = engine.quote("BTC", "USDT", amount).await.unwrap_err();
            assert!(matches!(err, EngineError::InvalidAmount(_)));
        }
    }

    #[tokio::test]
    async fn zero_price_is_invalid_data() {
        let err = engine(&[("BTCUSDT", dec!(0))])
            .quote("BTC", "USDT", dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Gateway(api_client::ApiError::InvalidData(_))));
    }

    #[tokio::test]
    async fn validate_pair_checks_both_directions() {
        let engine = engine(&[("ETHBTC", dec!(0.05))]);
        assert!(engine.validate_pair("ETH", "BTC").await.unwrap());
        assert!(engine.validate_pair("BTC", "ETH").await.unwrap());
        assert!(!engine.validate_pair("BTC", "SOL").await.unwrap());
    }

    #[tokio::test]
    async fn oversized_amounts_are_invalid() {
        let engine = engine(&[("BTCUSDT", dec!(60000))]);
        let huge = parse_amount("1e28").unwrap();
        let err = engine.quote("BTC", "USDT", huge).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));

        let tiny_price = self::engine(&[("BTCUSDT", dec!(0.0000000000000000000000000001))]);
        let err = tiny_price.quote("USDT", "BTC", huge).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[tokio::test]
    async fn quoted_amounts_drop_trailing_zeros() {
        let quote = engine(&[("BTCUSDT", dec!(60000))])
            .quote("BTC", "USDT", dec!(0.001))
            .await
            .unwrap();
        assert_eq!(quote.dest_amount.to_string(), "59.82");
        assert_eq!(quote.fee.to_string(), "0.18");
    }

    #[test]
    fn fee_deduction_rounds_to_scale() {
        let (net, fee) = deduct_fee(dec!(1), dec!(0.003)).unwrap();
        assert_eq!(net, dec!(0.997));
        assert_eq!(fee, dec!(0.003));
        assert!(deduct_fee(Decimal::MAX, dec!(2)).is_err());
    }

    #[test]
    fn parse_amount_accepts_numbers_only() {
        assert_eq!(parse_amount(" 0.001 ").unwrap(), dec!(0.001));
        assert_eq!(parse_amount("1e-3").unwrap(), dec!(0.001));
        assert!(matches!(parse_amount("abc"), Err(EngineError::InvalidAmount(_))));
        assert!(matches!(parse_amount("NaN"), Err(EngineError::InvalidAmount(_))));
        assert!(matches!(parse_amount("0"), Err(EngineError::InvalidAmount(_))));
    }
}
