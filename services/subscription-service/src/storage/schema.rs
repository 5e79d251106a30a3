use rusqlite::Connection;

use super::StoreError;

pub const DOCUMENTS_TABLE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    doc_id TEXT NOT NULL UNIQUE,
    collection TEXT NOT NULL,
    body TEXT NOT NULL CHECK (json_valid(body))
);
"#;

pub const DOCUMENTS_INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
"#;

pub fn init_database(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(DOCUMENTS_TABLE_SCHEMA)?;
    conn.execute_batch(DOCUMENTS_INDEXES)?;
    Ok(())
}
