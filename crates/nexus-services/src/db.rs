use rusqlite::Connection;

use nexus_store::Result;

/// Initialise the `services` table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS services (
            name         TEXT    NOT NULL PRIMARY KEY,
            enabled      INTEGER NOT NULL,
            deployed     INTEGER NOT NULL,
            subdomain    TEXT    NOT NULL DEFAULT '',
            port         INTEGER NOT NULL DEFAULT 0,
            public       INTEGER NOT NULL DEFAULT 0,
            core         INTEGER NOT NULL DEFAULT 0,
            description  TEXT    NOT NULL DEFAULT '',
            updated_at   TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
