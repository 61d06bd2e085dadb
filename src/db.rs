use anyhow::Result;
use rusqlite::{params, Connection};
use std::path::Path;

use crate::types::Lead;

/// Open the local lead archive, creating it (and its schema) on first use.
/// WAL keeps concurrent readers cheap; busy_timeout covers the rare case of
/// two commands touching the archive at once.
pub fn open_archive(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA busy_timeout = 5000;",
    )?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS leads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            phone TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
    )?;
    Ok(conn)
}

/// Record search results, keyed by normalized phone. Already-archived
/// numbers are skipped; returns how many rows were actually new. Leads whose
/// phone didn't normalize to anything are not archived.
pub fn record_leads(conn: &Connection, leads: &[Lead]) -> Result<usize> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO leads (phone, name, address, city)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    let mut inserted = 0;
    for lead in leads {
        if lead.normalized_phone.is_empty() {
            continue;
        }
        inserted += stmt.execute(params![
            lead.normalized_phone,
            lead.name,
            lead.address,
            lead.city
        ])?;
    }
    Ok(inserted)
}

/// Whether a normalized phone was returned by any earlier search.
pub fn lead_seen(conn: &Connection, normalized_phone: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM leads WHERE phone = ?1",
        [normalized_phone],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
