use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{MarketEvent, Result};

/// Binance kline WebSocket stream for a single pair and interval.
///
/// Publishes every kline update as a `MarketEvent`; consumers filter on
/// `is_candle_closed` themselves. Reconnects forever with exponential
/// backoff — a dropped socket must not take the bot down.
pub struct KlineStream {
    pair: String,
    interval: String,
    market_tx: broadcast::Sender<MarketEvent>,
}

impl KlineStream {
    pub fn new(
        pair: impl Into<String>,
        interval: impl Into<String>,
        market_tx: broadcast::Sender<MarketEvent>,
    ) -> Self {
        Self {
            pair: pair.into(),
            interval: interval.into(),
            market_tx,
        }
    }

    /// Run the stream loop forever. Call inside `tokio::spawn`.
    pub async fn run(self) {
        let mut backoff = Duration::from_secs(1);
        const MAX_BACKOFF: Duration = Duration::from_secs(60);

        loop {
            info!(pair = %self.pair, interval = %self.interval, "connecting kline stream");
            match self.connect_once().await {
                Ok(()) => {
                    // Clean close (e.g. 24h session rotation) — reconnect soon.
                    info!(pair = %self.pair, "kline stream closed cleanly");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    backoff = Duration::from_secs(1);
                }
                Err(e) => {
                    warn!(pair = %self.pair, error = %e, backoff = ?backoff, "kline stream error, reconnecting");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    async fn connect_once(&self) -> Result<()> {
        let url_str = format!(
            "wss://stream.binance.com:9443/ws/{}@kline_{}",
            self.pair.to_lowercase(),
            self.interval
        );
        // Validate the endpoint shape before dialing.
        let url = Url::parse(&url_str).map_err(|e| common::Error::WebSocket(e.to_string()))?;

        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| common::Error::WebSocket(e.to_string()))?;
        let (_, mut read) = ws_stream.split();

        while let Some(message) = read.next().await {
            let message = message.map_err(|e| common::Error::WebSocket(e.to_string()))?;
            if let tokio_tungstenite::tungstenite::Message::Text(text) = message {
                match parse_kline_event(&self.pair, &text) {
                    Ok(Some(event)) => {
                        // Send errors just mean no receivers right now.
                        let _ = self.market_tx.send(event);
                    }
                    Ok(None) => {} // not a kline payload
                    Err(e) => warn!(error = %e, "failed to parse kline event"),
                }
            }
        }
        Ok(())
    }
}

// ── kline JSON parsing ───────────────────────────────────────────────────

#[derive(Deserialize)]
struct KlineWrapper {
    k: KlineData,
}

#[derive(Deserialize)]
struct KlineData {
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "v")]
    volume: String,
    #[serde(rename = "x")]
    is_closed: bool,
    #[serde(rename = "T")]
    close_time_ms: i64,
}

fn parse_kline_event(pair: &str, text: &str) -> Result<Option<MarketEvent>> {
    // Kline messages carry an "e" discriminator set to "kline".
    let wrapper: serde_json::Value = serde_json::from_str(text)?;
    if wrapper.get("e").and_then(|v| v.as_str()) != Some("kline") {
        return Ok(None);
    }

    let kline: KlineWrapper = serde_json::from_value(wrapper)?;
    let k = kline.k;

    let timestamp: DateTime<Utc> = Utc
        .timestamp_millis_opt(k.close_time_ms)
        .single()
        .ok_or_else(|| common::Error::WebSocket("invalid kline close time".into()))?;

    let event = MarketEvent {
        pair: pair.to_string(),
        open: k.open.parse().unwrap_or(0.0),
        high: k.high.parse().unwrap_or(0.0),
        low: k.low.parse().unwrap_or(0.0),
        close: k.close.parse().unwrap_or(0.0),
        volume: k.volume.parse().unwrap_or(0.0),
        is_candle_closed: k.is_closed,
        timestamp,
    };

    // A closed candle with broken prices would poison the indicator
    // window; reject it at the boundary.
    if event.is_candle_closed && (event.close <= 0.0 || event.high <= event.low) {
        warn!(pair, "rejecting malformed closed kline");
        return Ok(None);
    }
    Ok(Some(event))
}
