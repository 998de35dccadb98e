use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::{debug, info, warn};

use common::{Bar, Error, ExecutionAdapter, Fill, Order, Result};

const BASE_URL: &str = "https://api.binance.com";
/// Binance caps one klines request at 1000 rows.
const KLINES_LIMIT: usize = 1000;
/// Hard ceiling on paginated history requests (1000 bars each).
const MAX_CHUNKS: usize = 200;

/// Binance REST client: public kline history for backtests and the
/// live-seed window, plus signed order endpoints implementing the
/// execution adapter for live mode.
pub struct BinanceClient {
    api_key: String,
    secret: String,
    http: Client,
}

impl BinanceClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            secret: secret.into(),
            http: Client::builder()
                .use_rustls_tls()
                .build()
                .expect("failed to build HTTP client"),
        }
    }

    /// Credential-less client for public market data endpoints.
    pub fn public() -> Self {
        Self::new("", "")
    }

    // ── market data ──────────────────────────────────────────────────────

    /// One page of klines, oldest first, at most 1000 rows. Malformed rows
    /// are rejected here so they never reach the indicator engine.
    pub async fn fetch_klines(
        &self,
        pair: &str,
        interval: &str,
        limit: usize,
        start_time: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>> {
        let mut url = format!(
            "{BASE_URL}/api/v3/klines?symbol={pair}&interval={interval}&limit={}",
            limit.min(KLINES_LIMIT)
        );
        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={}", start.timestamp_millis()));
        }

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }

        let rows: Vec<Value> = serde_json::from_str(&body)?;
        let mut bars = Vec::with_capacity(rows.len());
        for row in &rows {
            match parse_kline_row(row) {
                // Zero-width and non-positive-price rows never reach the
                // indicator engine.
                Some(bar)
                    if bar.high > bar.low
                        && bar.close > 0.0
                        && bar.open > 0.0
                        && bar.volume >= 0.0 =>
                {
                    bars.push(bar)
                }
                _ => warn!(pair, "rejecting malformed kline row"),
            }
        }
        Ok(bars)
    }

    /// Full history between `start` and `end` (or now), paginated past the
    /// per-request cap. Rows come back deduplicated and time-ordered.
    pub async fn fetch_history(
        &self,
        pair: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Bar>> {
        let end = end.unwrap_or_else(Utc::now);
        let mut all: Vec<Bar> = Vec::new();
        let mut cursor = start;

        for chunk in 0..MAX_CHUNKS {
            let page = self
                .fetch_klines(pair, interval, KLINES_LIMIT, Some(cursor))
                .await?;
            if page.is_empty() {
                break;
            }
            debug!(pair, chunk, rows = page.len(), "fetched kline page");

            let page_len = page.len();
            let last_timestamp = page[page.len() - 1].timestamp;
            for bar in page {
                let newer = all
                    .last()
                    .map_or(true, |prev| bar.timestamp > prev.timestamp);
                if newer {
                    all.push(bar);
                }
            }
            // A short page or reaching the end of the range means done.
            if page_len < KLINES_LIMIT || last_timestamp >= end {
                break;
            }
            cursor = last_timestamp + chrono::Duration::milliseconds(1);
        }

        all.retain(|b| b.timestamp <= end);
        info!(pair, bars = all.len(), %start, %end, "history fetch complete");
        Ok(all)
    }

    // ── signed endpoints ─────────────────────────────────────────────────

    fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sign(&self, query: &str) -> String {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let query = format!("{params}&timestamp={}", Self::timestamp_ms());
        let signature = self.sign(&query);
        let body = format!("{query}&signature={signature}");

        let resp = self
            .http
            .post(format!("{BASE_URL}{path}"))
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }
}

#[async_trait]
impl ExecutionAdapter for BinanceClient {
    async fn submit_order(&self, order: &Order) -> Result<Fill> {
        let order_type = if order.price.is_some() { "LIMIT" } else { "MARKET" };
        let mut params = format!(
            "symbol={}&side={}&type={}&quantity={}",
            order.pair, order.side, order_type, order.quantity
        );
        if let Some(price) = order.price {
            params.push_str(&format!("&price={price}&timeInForce=GTC"));
        }

        debug!(pair = %order.pair, side = %order.side, "submitting order to Binance");
        let body = self.signed_post("/api/v3/order", &params).await?;
        let resp: OrderResponse =
            serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))?;

        let fill_price = match resp.fills.first().and_then(|f| f.price.parse::<f64>().ok()) {
            Some(price) => price,
            // Market orders occasionally come back without fill detail;
            // fall back to the current ticker.
            None => self.current_price(&order.pair).await?,
        };

        Ok(Fill {
            order_id: resp.client_order_id,
            pair: order.pair.clone(),
            side: order.side,
            fill_price,
            quantity: order.quantity,
            timestamp: Utc::now(),
        })
    }

    async fn current_price(&self, pair: &str) -> Result<f64> {
        let url = format!("{BASE_URL}/api/v3/ticker/price?symbol={pair}");
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;
        let ticker: PriceTicker = resp.json().await.map_err(|e| Error::Http(e.to_string()))?;
        ticker
            .price
            .parse::<f64>()
            .map_err(|e| Error::Exchange(e.to_string()))
    }
}

/// Klines come back as positional JSON arrays:
/// `[open_time, open, high, low, close, volume, close_time, ...]`
/// with prices as strings.
fn parse_kline_row(row: &Value) -> Option<Bar> {
    let fields = row.as_array()?;
    let open_time = fields.first()?.as_i64()?;
    let price = |i: usize| fields.get(i)?.as_str()?.parse::<f64>().ok();

    Some(Bar {
        timestamp: Utc.timestamp_millis_opt(open_time).single()?,
        open: price(1)?,
        high: price(2)?,
        low: price(3)?,
        close: price(4)?,
        volume: price(5)?,
    })
}

// ── response types ───────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    #[serde(default)]
    fills: Vec<FillDetail>,
}

#[derive(Deserialize)]
struct FillDetail {
    price: String,
}

#[derive(Deserialize)]
struct PriceTicker {
    price: String,
}
