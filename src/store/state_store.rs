use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::engine::EngineRow;
use crate::error::EngineError;
use crate::model::Timeframe;

/// Bump when `StateRecord` changes shape; readers refuse newer versions.
pub const STATE_SCHEMA_VERSION: u32 = 1;

/// Versioned persisted payload, one per (symbol, timeframe, asof).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRecord {
    pub version: u32,
    pub row: EngineRow,
}

/// Embedded relational store for computed state. Written by orchestration
/// code; the core engine only returns values.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS regime_state (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                asof_ms INTEGER NOT NULL,
                schema_version INTEGER NOT NULL,
                payload TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                PRIMARY KEY(symbol, timeframe, asof_ms)
            );

            CREATE TABLE IF NOT EXISTS regime_latest (
                symbol TEXT NOT NULL,
                timeframe TEXT NOT NULL,
                asof_ms INTEGER NOT NULL,
                schema_version INTEGER NOT NULL,
                payload TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL,
                PRIMARY KEY(symbol, timeframe)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    /// Upsert computed rows and refresh the latest pointer.
    pub fn upsert_rows(
        &mut self,
        symbol: &str,
        timeframe: Timeframe,
        rows: &[EngineRow],
    ) -> Result<usize, EngineError> {
        let tf = timeframe.label();
        let now_ms = chrono::Utc::now().timestamp_millis();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO regime_state (
                    symbol, timeframe, asof_ms, schema_version, payload, updated_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(symbol, timeframe, asof_ms) DO UPDATE SET
                    schema_version = excluded.schema_version,
                    payload = excluded.payload,
                    updated_at_ms = excluded.updated_at_ms
                "#,
            )?;
            for row in rows {
                let record = StateRecord {
                    version: STATE_SCHEMA_VERSION,
                    row: row.clone(),
                };
                stmt.execute(params![
                    symbol,
                    tf,
                    row.ts_ms,
                    STATE_SCHEMA_VERSION,
                    serde_json::to_string(&record)?,
                    now_ms,
                ])?;
            }
        }
        if let Some(last) = rows.last() {
            let record = StateRecord {
                version: STATE_SCHEMA_VERSION,
                row: last.clone(),
            };
            tx.execute(
                r#"
                INSERT INTO regime_latest (
                    symbol, timeframe, asof_ms, schema_version, payload, updated_at_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(symbol, timeframe) DO UPDATE SET
                    asof_ms = excluded.asof_ms,
                    schema_version = excluded.schema_version,
                    payload = excluded.payload,
                    updated_at_ms = excluded.updated_at_ms
                "#,
                params![
                    symbol,
                    tf,
                    last.ts_ms,
                    STATE_SCHEMA_VERSION,
                    serde_json::to_string(&record)?,
                    now_ms,
                ],
            )?;
        }
        tx.commit()?;
        info!(symbol, timeframe = %tf, rows = rows.len(), "state rows upserted");
        Ok(rows.len())
    }

    /// All persisted rows for one (symbol, timeframe), ordered by asof.
    pub fn load_rows(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Vec<EngineRow>, EngineError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT payload FROM regime_state
            WHERE symbol = ?1 AND timeframe = ?2
            ORDER BY asof_ms ASC
            "#,
        )?;
        let payloads = stmt.query_map(params![symbol, timeframe.label()], |row| {
            row.get::<_, String>(0)
        })?;
        let mut rows = Vec::new();
        for payload in payloads {
            rows.push(decode_record(&payload?)?.row);
        }
        Ok(rows)
    }

    /// Latest persisted row, if any.
    pub fn latest(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<EngineRow>, EngineError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM regime_latest WHERE symbol = ?1 AND timeframe = ?2",
                params![symbol, timeframe.label()],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(decode_record(&p)?.row)),
            None => Ok(None),
        }
    }
}

fn decode_record(payload: &str) -> Result<StateRecord, EngineError> {
    let record: StateRecord = serde_json::from_str(payload)?;
    if record.version > STATE_SCHEMA_VERSION {
        return Err(EngineError::MalformedInput(format!(
            "state record version {} is newer than supported {}",
            record.version, STATE_SCHEMA_VERSION
        )));
    }
    Ok(record)
}
