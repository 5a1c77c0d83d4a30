use std::path::Path;

use chrono::{TimeZone, Utc};
use duckdb::{params, Connection};
use tracing::info;

use crate::error::EngineError;
use crate::model::{Bar, Timeframe};

/// Columnar on-disk bar storage. One logical partition per calendar date;
/// duplicate timestamps resolve last-write-wins.
pub struct BarStore {
    conn: Connection,
}

impl BarStore {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS bars (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                partition_date TEXT NOT NULL,
                ts_ms BIGINT NOT NULL,
                open DOUBLE NOT NULL,
                high DOUBLE NOT NULL,
                low DOUBLE NOT NULL,
                close DOUBLE NOT NULL,
                volume DOUBLE NOT NULL,
                PRIMARY KEY(symbol, timeframe, ts_ms)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Append bars; an existing timestamp is overwritten (last write wins).
    pub fn write_bars(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        rows: &[Bar],
    ) -> Result<usize, EngineError> {
        let tf = timeframe.label();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR REPLACE INTO bars (
                    symbol, timeframe, partition_date, ts_ms,
                    open, high, low, close, volume
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )?;
            for bar in rows {
                stmt.execute(params![
                    symbol,
                    tf,
                    partition_date(bar.ts_ms),
                    bar.ts_ms,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                ])?;
            }
        }
        tx.commit()?;
        info!(symbol, timeframe = %tf, rows = rows.len(), "bars written");
        Ok(rows.len())
    }

    /// Ordered bars for one (symbol, timeframe), optionally up to a
    /// timestamp inclusive.
    pub fn get_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        upto_ts_ms: Option<i64>,
    ) -> Result<Vec<Bar>, EngineError> {
        let tf = timeframe.label();
        let upto = upto_ts_ms.unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ts_ms, open, high, low, close, volume
            FROM bars
            WHERE symbol = ? AND timeframe = ? AND ts_ms <= ?
            ORDER BY ts_ms ASC
            "#,
        )?;
        let rows = stmt.query_map(params![symbol, tf, upto], |row| {
            Ok(Bar {
                ts_ms: row.get(0)?,
                open: row.get(1)?,
                high: row.get(2)?,
                low: row.get(3)?,
                close: row.get(4)?,
                volume: row.get(5)?,
            })
        })?;
        let mut bars = Vec::new();
        for bar in rows {
            bars.push(bar?);
        }
        Ok(bars)
    }
}

fn partition_date(ts_ms: i64) -> String {
    match Utc.timestamp_millis_opt(ts_ms) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d").to_string(),
        _ => "invalid".to_string(),
    }
}
