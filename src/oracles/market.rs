//! Market data sources backing the oracles
//!
//! Storage is an external collaborator; the oracles only see this trait.
//! `HttpMarketData` calls the platform's data API, `StaticMarketData` keeps
//! the system functional without one.

use crate::error::OrchestrationError;
use crate::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetQuote {
    pub name: String,
    pub symbol: String,
    pub tokenized_symbol: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub market_cap: String,
    pub volume: String,
}

impl AssetQuote {
    /// Case-insensitive match on name, symbol or tokenized symbol
    pub fn matches(&self, query: &str) -> bool {
        let q = query.trim();
        !q.is_empty()
            && (self.name.eq_ignore_ascii_case(q)
                || self.symbol.eq_ignore_ascii_case(q)
                || self.tokenized_symbol.eq_ignore_ascii_case(q))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PressRelease {
    pub symbol: String,
    pub title: String,
    pub summary: String,
    pub published: NaiveDate,
}

#[async_trait]
pub trait MarketData: Send + Sync {
    async fn asset(&self, query: &str) -> Result<Option<AssetQuote>>;
    async fn assets(&self) -> Result<Vec<AssetQuote>>;
    async fn press_releases(&self, symbol: &str) -> Result<Vec<PressRelease>>;
    async fn latest_press_releases(&self, limit: usize) -> Result<Vec<PressRelease>>;
}

//
// ========== In-memory ==========
//

pub struct StaticMarketData {
    assets: Vec<AssetQuote>,
    releases: Vec<PressRelease>,
}

impl StaticMarketData {
    pub fn new(assets: Vec<AssetQuote>, releases: Vec<PressRelease>) -> Self {
        Self { assets, releases }
    }
}

fn quote(
    name: &str,
    symbol: &str,
    price: f64,
    change: f64,
    change_percent: f64,
    market_cap: &str,
    volume: &str,
) -> AssetQuote {
    AssetQuote {
        name: name.to_string(),
        symbol: symbol.to_string(),
        tokenized_symbol: format!("hh{}", symbol),
        price,
        change,
        change_percent,
        market_cap: market_cap.to_string(),
        volume: volume.to_string(),
    }
}

fn release(symbol: &str, title: &str, summary: &str, (y, m, d): (i32, u32, u32)) -> Option<PressRelease> {
    Some(PressRelease {
        symbol: symbol.to_string(),
        title: title.to_string(),
        summary: summary.to_string(),
        published: NaiveDate::from_ymd_opt(y, m, d)?,
    })
}

impl Default for StaticMarketData {
    fn default() -> Self {
        let assets = vec![
            quote("Safaricom", "SCOM", 10.00, 0.35, 2.07, "691.4B KES", "3.5M"),
            quote("Equity Group Holdings", "EQTY", 45.65, -0.55, -1.19, "172.1B KES", "1.2M"),
            quote("Kenya Airways", "KQ", 3.82, 0.12, 3.24, "21.5B KES", "5.7M"),
            quote("KCB Group", "KCB", 38.10, 0.40, 1.06, "122.4B KES", "900K"),
            quote("East African Breweries", "EABL", 152.25, -1.75, -1.14, "120.4B KES", "250K"),
        ];

        let releases = [
            release(
                "SCOM",
                "Safaricom posts full-year results",
                "Service revenue grew on M-PESA and mobile data; the board recommended a final dividend.",
                (2024, 5, 9),
            ),
            release(
                "SCOM",
                "Safaricom expands 5G coverage",
                "5G sites now cover major towns across all regions.",
                (2024, 3, 14),
            ),
            release(
                "EQTY",
                "Equity Group half-year results",
                "Profit after tax rose on loan book growth across regional subsidiaries.",
                (2024, 8, 28),
            ),
            release(
                "KQ",
                "Kenya Airways returns to operating profit",
                "Higher passenger numbers and cargo volumes lifted operating income.",
                (2024, 8, 30),
            ),
        ]
        .into_iter()
        .flatten()
        .collect();

        Self::new(assets, releases)
    }
}

#[async_trait]
impl MarketData for StaticMarketData {
    async fn asset(&self, query: &str) -> Result<Option<AssetQuote>> {
        Ok(self.assets.iter().find(|a| a.matches(query)).cloned())
    }

    async fn assets(&self) -> Result<Vec<AssetQuote>> {
        Ok(self.assets.clone())
    }

    async fn press_releases(&self, symbol: &str) -> Result<Vec<PressRelease>> {
        Ok(self
            .releases
            .iter()
            .filter(|r| r.symbol.eq_ignore_ascii_case(symbol))
            .cloned()
            .collect())
    }

    async fn latest_press_releases(&self, limit: usize) -> Result<Vec<PressRelease>> {
        let mut releases = self.releases.clone();
        releases.sort_by(|a, b| b.published.cmp(&a.published));
        releases.truncate(limit);
        Ok(releases)
    }
}

//
// ========== HTTP-backed ==========
//

#[derive(Clone)]
pub struct HttpMarketData {
    client: Client,
    base_url: Url,
}

impl HttpMarketData {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url).map_err(|e| {
            OrchestrationError::ConfigError(format!("Invalid market API URL '{}': {}", base_url, e))
        })?;

        if parsed.cannot_be_a_base() {
            return Err(OrchestrationError::ConfigError(format!(
                "Market API URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
        })
    }

    /// Each segment is percent-encoded and stays a single path segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                OrchestrationError::ConfigError(format!(
                    "Market API URL '{}' cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn assets_url(&self) -> Result<Url> {
        self.endpoint(&["api", "assets"])
    }

    fn press_releases_url(&self, symbol: &str) -> Result<Url> {
        self.endpoint(&["api", "assets", symbol, "press-releases"])
    }

    fn latest_press_releases_url(&self, limit: usize) -> Result<Url> {
        let mut url = self.endpoint(&["api", "press-releases"])?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let path = url.path().to_string();

        let response = self.client.get(url).send().await.map_err(|e| {
            OrchestrationError::MarketDataError(format!("Request failed for {}: {}", path, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::MarketDataError(format!(
                "Market API returned {} for {}: {}",
                status, path, body
            )));
        }

        response.json::<T>().await.map_err(|e| {
            OrchestrationError::MarketDataError(format!("Invalid JSON response: {}", e))
        })
    }
}

#[async_trait]
impl MarketData for HttpMarketData {
    async fn asset(&self, query: &str) -> Result<Option<AssetQuote>> {
        Ok(self.assets().await?.into_iter().find(|a| a.matches(query)))
    }

    async fn assets(&self) -> Result<Vec<AssetQuote>> {
        self.get_json(self.assets_url()?).await
    }

    async fn press_releases(&self, symbol: &str) -> Result<Vec<PressRelease>> {
        self.get_json(self.press_releases_url(symbol)?).await
    }

    async fn latest_press_releases(&self, limit: usize) -> Result<Vec<PressRelease>> {
        self.get_json(self.latest_press_releases_url(limit)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_by_name_or_symbol() {
        let market = StaticMarketData::default();

        let by_name = market.asset("safaricom").await.unwrap().unwrap();
        let by_symbol = market.asset("SCOM").await.unwrap().unwrap();
        let by_token = market.asset("hhSCOM").await.unwrap().unwrap();

        assert_eq!(by_name, by_symbol);
        assert_eq!(by_token.price, 10.00);
        assert!(market.asset("").await.unwrap().is_none());
        assert!(market.asset("Apple").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_latest_releases_are_newest_first() {
        let market = StaticMarketData::default();

        let latest = market.latest_press_releases(2).await.unwrap();

        assert_eq!(latest.len(), 2);
        assert!(latest[0].published >= latest[1].published);
        assert_eq!(market.press_releases("scom").await.unwrap().len(), 2);
    }

    #[test]
    fn test_http_urls_keep_symbols_in_one_segment() {
        let market = HttpMarketData::new("http://localhost:3000").unwrap();

        assert_eq!(
            market.assets_url().unwrap().as_str(),
            "http://localhost:3000/api/assets"
        );
        assert_eq!(
            market.press_releases_url("SCOM").unwrap().as_str(),
            "http://localhost:3000/api/assets/SCOM/press-releases"
        );
        assert_eq!(
            market.press_releases_url("a/../../x").unwrap().path(),
            "/api/assets/a%2F..%2F..%2Fx/press-releases"
        );

        let with_query = market.press_releases_url("SCOM?limit=999").unwrap();
        assert_eq!(with_query.path(), "/api/assets/SCOM%3Flimit=999/press-releases");
        assert!(with_query.query().is_none());

        assert_eq!(
            market.latest_press_releases_url(5).unwrap().as_str(),
            "http://localhost:3000/api/press-releases?limit=5"
        );
    }

    #[test]
    fn test_http_base_url_prefix_and_validation() {
        let market = HttpMarketData::new("https://data.example.com/v1/").unwrap();

        assert_eq!(
            market.assets_url().unwrap().as_str(),
            "https://data.example.com/v1/api/assets"
        );
        assert!(matches!(
            HttpMarketData::new("not a url"),
            Err(OrchestrationError::ConfigError(_))
        ));
        assert!(HttpMarketData::new("mailto:desk@example.com").is_err());
    }
}
