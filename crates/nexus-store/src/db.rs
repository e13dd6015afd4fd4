use rusqlite::Connection;

use crate::error::Result;

/// Initialise the key/value `config` table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS config (
            key         TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
