use anyhow::{Context, Result};
use rusqlite::Connection;

pub fn apply(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            written_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS kv_entries_written_at ON kv_entries(written_at);
        "#,
    )
    .context("applying schema migrations")?;
    Ok(())
}
