use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

use common::{Bar, Error, Result};

/// One CSV row: `timestamp,open,high,low,close,volume`. The timestamp may
/// be unix seconds, unix milliseconds, RFC 3339, or a plain date.
#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

/// Load an OHLCV file for offline replays. Ordering and shape are checked
/// again by the replay engine; this only gets the rows into memory.
pub fn load_csv_bars(path: &str) -> Result<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::Other(format!("cannot open '{path}': {e}")))?;

    let mut bars = Vec::new();
    for (line, row) in reader.deserialize::<CsvBar>().enumerate() {
        let row = row.map_err(|e| Error::Other(format!("{path} row {}: {e}", line + 1)))?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| {
            Error::Other(format!(
                "{path} row {}: unrecognized timestamp '{}'",
                line + 1,
                row.timestamp
            ))
        })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    Ok(bars)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(epoch) = raw.parse::<i64>() {
        // Heuristic: anything past ~2286 in seconds is really milliseconds.
        return if epoch > 10_000_000_000 {
            Utc.timestamp_millis_opt(epoch).single()
        } else {
            Utc.timestamp_opt(epoch, 0).single()
        };
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_rfc3339_rows() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n\
             2024-01-02T00:00:00Z,100.0,101.0,99.0,100.5,1200\n\
             2024-01-02T01:00:00Z,100.5,102.0,100.0,101.5,900\n",
        );
        let bars = load_csv_bars(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.5);
        assert!(bars[1].timestamp > bars[0].timestamp);
    }

    #[test]
    fn loads_unix_second_and_millisecond_rows() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n\
             1704153600,100,101,99,100.5,10\n\
             1704157200000,100.5,102,100,101.5,11\n",
        );
        let bars = load_csv_bars(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bars[0].timestamp.timestamp(), 1_704_153_600);
        assert_eq!(bars[1].timestamp.timestamp(), 1_704_157_200);
    }

    #[test]
    fn loads_plain_dates_without_volume_column_value() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n\
             2024-01-02,100,101,99,100.5,0\n",
        );
        let bars = load_csv_bars(file.path().to_str().unwrap()).unwrap();
        assert_eq!(bars[0].volume, 0.0);
    }

    #[test]
    fn bad_timestamp_reports_row() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n\
             yesterday,100,101,99,100.5,10\n",
        );
        let err = load_csv_bars(file.path().to_str().unwrap()).unwrap_err();
        assert!(err.to_string().contains("row 1"));
    }
}
