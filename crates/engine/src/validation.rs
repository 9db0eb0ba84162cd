use crate::error::EngineError;
use regex::Regex;
use std::sync::LazyLock;

static BTC_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(bc1|[13])[a-km-zA-HJ-NP-Z1-9]{25,34}$").expect("valid regex"));
static EVM_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("valid regex"));
static SOL_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid regex"));
static ADA_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^addr1[a-z0-9]{98}$").expect("valid regex"));
static DOT_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^1[a-km-zA-HJ-NP-Z1-9]{46,47}$").expect("valid regex"));

fn address_format(asset: &str) -> Option<&'static Regex> {
    match asset {
        "BTC" => Some(&BTC_ADDRESS),
        "ETH" | "USDT" | "USDC" | "LINK" | "UNI" | "BNB" => Some(&EVM_ADDRESS),
        "SOL" => Some(&SOL_ADDRESS),
        "ADA" => Some(&ADA_ADDRESS),
        "DOT" => Some(&DOT_ADDRESS),
        _ => None,
    }
}

/// Normalises an asset symbol to upper case, rejecting empty or non-alphanumeric input.
pub fn normalize_asset(raw: &str) -> Result<String, EngineError> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        return Err(EngineError::Validation("asset symbol is required".to_string()));
    }
    if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(EngineError::Validation(format!(
            "invalid asset symbol '{}'",
            symbol
        )));
    }
    Ok(symbol.to_ascii_uppercase())
}

/// Checks a payout address against the known format for `asset`.
///
/// Assets without a known format only need a non-blank address.
pub fn validate_destination_address(asset: &str, address: &str) -> Result<(), EngineError> {
    if address.trim().is_empty() {
        return Err(EngineError::Validation(
            "destination address is required".to_string(),
        ));
    }
    let asset = asset.to_ascii_uppercase();
    match address_format(&asset) {
        Some(format) if !format.is_match(address) => Err(EngineError::Validation(format!(
            "invalid {} address format",
            asset
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_assets_share_the_hex_format() {
        let address = "0x521b7FE4D6C6c21B42336E8F2D73C04B142FD6d7";
        for asset in ["ETH", "usdt", "USDC", "LINK", "UNI", "BNB"] {
            assert!(validate_destination_address(asset, address).is_ok(), "{asset}");
        }
        assert!(validate_destination_address("ETH", "0xabc").is_err());
        assert!(validate_destination_address("USDT", "521b7FE4D6C6c21B42336E8F2D73C04B142FD6d7").is_err());
    }

    #[test]
    fn bitcoin_addresses() {
        assert!(validate_destination_address("BTC", "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa").is_ok());
        assert!(validate_destination_address("BTC", "bc1qxy2kgdygjrsqtzq2n9yrf2493p83kkfjh").is_ok());
        assert!(validate_destination_address("BTC", "0x521b7FE4D6C6c21B42336E8F2D73C04B142FD6d7").is_err());
    }

    #[test]
    fn solana_and_polkadot_addresses() {
        assert!(validate_destination_address("SOL", "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T").is_ok());
        assert!(validate_destination_address("SOL", "0OIl").is_err());
        assert!(validate_destination_address("DOT", "15oF4uVJwmo4TdGW7VfQxNLavjCXviqxT9S1MgbjMNHr6Sp5").is_ok());
    }

    #[test]
    fn unknown_assets_need_only_a_value() {
        assert!(validate_destination_address("XYZ", "anything-goes").is_ok());
        assert!(validate_destination_address("XYZ", "   ").is_err());
    }

    #[test]
    fn asset_symbols_are_normalised() {
        assert_eq!(normalize_asset(" btc ").unwrap(), "BTC");
        assert!(normalize_asset("").is_err());
        assert!(normalize_asset("BT C").is_err());
        assert!(normalize_asset("ETH/USDT").is_err());
    }
}
