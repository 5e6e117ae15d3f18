//! Built-in oracles
//!
//! Read-only context providers over a `MarketData` source.

use crate::capability::{CapabilityDescriptor, Oracle};
use crate::error::OrchestrationError;
use crate::schema::object_schema;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

pub mod market;

pub use market::{AssetQuote, HttpMarketData, MarketData, PressRelease, StaticMarketData};

pub const GET_ASSET_PRICE: &str = "GET_ASSET_PRICE";
pub const GET_ASSET_PRICES: &str = "GET_ASSET_PRICES";
pub const PRESS_RELEASE_SPECIFIC: &str = "PRESS_RELEASE_SPECIFIC";
pub const PRESS_RELEASE_GENERAL: &str = "PRESS_RELEASE_GENERAL";

const GENERAL_RELEASE_LIMIT: usize = 5;

fn require_asset(args: &Value, oracle: &str) -> Result<String> {
    args.get("asset")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            OrchestrationError::InvalidInput(format!("{} expects a non-empty 'asset'", oracle))
        })
}

fn asset_input_schema() -> Value {
    object_schema(&[("asset", "string")])
}

/// Latest quote for one asset
pub struct AssetPriceOracle {
    descriptor: CapabilityDescriptor,
    market: Arc<dyn MarketData>,
}

impl AssetPriceOracle {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                GET_ASSET_PRICE,
                "Get the current price and daily change of a specific asset on the NSE, \
                 by company name or ticker symbol",
                json!({ "type": "object" }),
                asset_input_schema(),
            ),
            market,
        }
    }
}

#[async_trait]
impl Oracle for AssetPriceOracle {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn consult(&self, args: Value) -> Result<Value> {
        let asset = require_asset(&args, GET_ASSET_PRICE)?;

        match self.market.asset(&asset).await? {
            Some(quote) => Ok(serde_json::to_value(quote)?),
            None => Ok(json!({
                "asset": asset,
                "error": "Asset not listed"
            })),
        }
    }
}

/// Quotes for every listed asset
pub struct AssetPricesOracle {
    descriptor: CapabilityDescriptor,
    market: Arc<dyn MarketData>,
}

impl AssetPricesOracle {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                GET_ASSET_PRICES,
                "Get the current prices of all the assets listed on the NSE",
                json!({ "type": "array" }),
                Value::Null,
            ),
            market,
        }
    }
}

#[async_trait]
impl Oracle for AssetPricesOracle {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn consult(&self, _args: Value) -> Result<Value> {
        Ok(serde_json::to_value(self.market.assets().await?)?)
    }
}

/// Press releases for one asset
pub struct PressReleaseOracle {
    descriptor: CapabilityDescriptor,
    market: Arc<dyn MarketData>,
}

impl PressReleaseOracle {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                PRESS_RELEASE_SPECIFIC,
                "Get press releases published by a specific company listed on the NSE",
                json!({ "type": "array" }),
                asset_input_schema(),
            ),
            market,
        }
    }
}

#[async_trait]
impl Oracle for PressReleaseOracle {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn consult(&self, args: Value) -> Result<Value> {
        let asset = require_asset(&args, PRESS_RELEASE_SPECIFIC)?;

        // Releases are keyed by symbol; resolve names first.
        let symbol = match self.market.asset(&asset).await? {
            Some(quote) => quote.symbol,
            None => asset,
        };

        Ok(serde_json::to_value(self.market.press_releases(&symbol).await?)?)
    }
}

/// Most recent press releases across the exchange
pub struct LatestPressReleasesOracle {
    descriptor: CapabilityDescriptor,
    market: Arc<dyn MarketData>,
}

impl LatestPressReleasesOracle {
    pub fn new(market: Arc<dyn MarketData>) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                PRESS_RELEASE_GENERAL,
                "Get the most recent press releases across all companies listed on the NSE",
                json!({ "type": "array" }),
                Value::Null,
            ),
            market,
        }
    }
}

#[async_trait]
impl Oracle for LatestPressReleasesOracle {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn consult(&self, _args: Value) -> Result<Value> {
        let releases = self
            .market
            .latest_press_releases(GENERAL_RELEASE_LIMIT)
            .await?;
        Ok(serde_json::to_value(releases)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::consult_oracle;

    fn market() -> Arc<dyn MarketData> {
        Arc::new(StaticMarketData::default())
    }

    #[tokio::test]
    async fn test_asset_price_oracle() {
        let oracle = AssetPriceOracle::new(market());

        let value = consult_oracle(&oracle, json!({ "asset": "Safaricom" })).await.unwrap();
        assert_eq!(value["symbol"], "SCOM");
        assert_eq!(value["price"], 10.0);

        let missing = consult_oracle(&oracle, json!({ "asset": "Apple" })).await.unwrap();
        assert_eq!(missing["error"], "Asset not listed");

        let invalid = consult_oracle(&oracle, json!({})).await;
        assert!(matches!(invalid, Err(OrchestrationError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_asset_prices_oracle_lists_everything() {
        let oracle = AssetPricesOracle::new(market());

        let value = consult_oracle(&oracle, json!({ "task": "show all prices" })).await.unwrap();

        assert_eq!(value.as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_press_release_oracles() {
        let specific = PressReleaseOracle::new(market());
        let general = LatestPressReleasesOracle::new(market());

        let scom = consult_oracle(&specific, json!({ "asset": "Safaricom" })).await.unwrap();
        assert_eq!(scom.as_array().unwrap().len(), 2);
        assert!(scom[0]["title"].as_str().unwrap().contains("Safaricom"));

        let latest = consult_oracle(&general, json!({})).await.unwrap();
        assert_eq!(latest.as_array().unwrap().len(), 4);
        assert_eq!(latest[0]["symbol"], "KQ");
    }
}
