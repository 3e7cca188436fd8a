use crate::error::Result;
use crate::persistence::{DocumentKey, DocumentStore};
use crate::records::Dataset;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

/// SQLite-backed document store: one row per (collection, name)
pub struct SqliteStore {
    conn: Connection,
    key: DocumentKey,
}

impl SqliteStore {
    pub fn open(path: &Path, key: DocumentKey) -> Result<Self> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteStore { conn, key })
    }

    pub fn from_connection(conn: Connection, key: DocumentKey) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore { conn, key })
    }

    /// Last time the document was replaced (RFC 3339)
    pub fn updated_at(&self) -> Result<Option<String>> {
        let updated = self
            .conn
            .query_row(
                "SELECT updated_at FROM documents WHERE collection = ?1 AND name = ?2",
                params![self.key.collection, self.key.name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(updated)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            name TEXT NOT NULL,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, name)
        )",
        [],
    )?;

    Ok(())
}

impl DocumentStore for SqliteStore {
    fn load(&self) -> Result<Option<Dataset>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND name = ?2",
                params![self.key.collection, self.key.name],
                |row| row.get(0),
            )
            .optional()?;

        match body {
            Some(json) => {
                debug!(collection = %self.key.collection, name = %self.key.name, "dataset loaded");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => Ok(None),
        }
    }

    fn save(&self, dataset: &Dataset) -> Result<()> {
        let body = serde_json::to_string(dataset)?;

        self.conn.execute(
            "INSERT INTO documents (collection, name, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, name) DO UPDATE SET
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![self.key.collection, self.key.name, body, Utc::now().to_rfc3339()],
        )?;

        debug!(collection = %self.key.collection, name = %self.key.name, "dataset saved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite document {}/{}", self.key.collection, self.key.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{DayRecords, PaymentMethod, TradeType, Transaction};

    fn memory_store(name: &str) -> SqliteStore {
        let conn = Connection::open_in_memory().unwrap();
        SqliteStore::from_connection(conn, DocumentKey::new("ecorecycle", name)).unwrap()
    }

    fn dataset_with_sale(total: f64) -> Dataset {
        let mut dataset = Dataset::default();
        dataset.days.insert(
            "2025-03-14".to_string(),
            DayRecords {
                transactions: vec![Transaction {
                    id: 1,
                    time: "09:30".to_string(),
                    trade: TradeType::Sell,
                    material: "Copper".to_string(),
                    client: "Metals Ltd".to_string(),
                    method: PaymentMethod::Transfer,
                    total,
                }],
                ..Default::default()
            },
        );
        dataset
    }

    #[test]
    fn test_empty_database_has_no_document() {
        let store = memory_store("db");

        assert!(store.load().unwrap().is_none());
        assert!(store.updated_at().unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_document() {
        let store = memory_store("db");

        store.save(&dataset_with_sale(100.0)).unwrap();
        store.save(&dataset_with_sale(250.0)).unwrap();

        let count: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1, "second save should update, not insert");

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, dataset_with_sale(250.0));
        assert!(store.updated_at().unwrap().is_some());

        println!("✅ Document upsert test PASSED");
    }

    #[test]
    fn test_documents_are_keyed_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("eco.db");

        let main = SqliteStore::open(&path, DocumentKey::new("ecorecycle", "db")).unwrap();
        main.save(&dataset_with_sale(10.0)).unwrap();

        let other = SqliteStore::open(&path, DocumentKey::new("ecorecycle", "backup")).unwrap();
        assert!(other.load().unwrap().is_none());
        assert!(main.load().unwrap().is_some());
    }
}
