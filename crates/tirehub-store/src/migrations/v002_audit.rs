use rusqlite::Connection;

const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS backup_history (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    action     TEXT NOT NULL,               -- backup | restore
    filename   TEXT NOT NULL,
    status     TEXT NOT NULL,               -- success | failed
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS system_logs (
    id         TEXT PRIMARY KEY NOT NULL,
    action     TEXT NOT NULL,
    details    TEXT NOT NULL,
    user_id    TEXT,                        -- acting user, not enforced as FK
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS archive_history (
    id          TEXT PRIMARY KEY NOT NULL,
    filename    TEXT,                       -- NULL when the file was never written
    order_count INTEGER NOT NULL,
    status      TEXT NOT NULL,              -- success | failed
    error       TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_backup_history_created ON backup_history(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_archive_history_created ON archive_history(created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
