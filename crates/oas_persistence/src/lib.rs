use log::debug;
use oas_store::{SnapshotStorage, StoreSnapshot};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// store 快照使用的键
pub const STORE_KEY: &str = "oas-storage";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Deserialize error for key {key}: {source}")]
    Deserialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Data directory not found")]
    NoDataDir,
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// 键值数据库
pub struct Database {
    conn: Connection,
}

impl Database {
    /// 创建或打开数据库
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// 使用默认路径创建数据库
    pub fn open_default() -> Result<Self> {
        let data_dir = Self::get_data_dir()?;
        std::fs::create_dir_all(&data_dir)?;
        let db_path = data_dir.join("oas.db");
        debug!("打开数据库: {:?}", db_path);
        Self::new(db_path)
    }

    /// 获取数据目录路径
    fn get_data_dir() -> Result<PathBuf> {
        let base = dirs::data_local_dir().ok_or(PersistenceError::NoDataDir)?;
        Ok(base.join("OAS"))
    }

    /// 初始化数据库表
    fn initialize(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;

        Ok(())
    }

    /// 保存值
    pub fn save_value(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取值
    pub fn get_value(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// 删除值
    pub fn delete_value(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub fn save_snapshot(&self, snapshot: &StoreSnapshot) -> Result<()> {
        let document = serde_json::to_string(snapshot).map_err(PersistenceError::Serialize)?;
        self.save_value(STORE_KEY, &document)?;
        debug!("保存 store 快照: {} 字节", document.len());
        Ok(())
    }

    pub fn load_snapshot(&self) -> Result<Option<StoreSnapshot>> {
        let Some(document) = self.get_value(STORE_KEY)? else {
            return Ok(None);
        };
        let snapshot =
            serde_json::from_str(&document).map_err(|source| PersistenceError::Deserialize {
                key: STORE_KEY.to_string(),
                source,
            })?;
        Ok(Some(snapshot))
    }
}

impl SnapshotStorage for Database {
    fn load(&mut self) -> anyhow::Result<Option<StoreSnapshot>> {
        Ok(self.load_snapshot()?)
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> anyhow::Result<()> {
        Ok(self.save_snapshot(snapshot)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oas_core::{KeyboardLayout, NewBlock, PracticeModeUpdate};
    use oas_store::PersistentStore;

    #[test]
    fn test_database_creation() {
        let db = Database::new(":memory:").unwrap();
        assert!(db.get_value("missing").unwrap().is_none());
        assert!(db.load_snapshot().unwrap().is_none());
    }

    #[test]
    fn test_value_roundtrip() {
        let db = Database::new(":memory:").unwrap();
        db.save_value("theme", "forest").unwrap();
        db.save_value("theme", "khaki").unwrap();
        assert_eq!(db.get_value("theme").unwrap().as_deref(), Some("khaki"));

        db.delete_value("theme").unwrap();
        assert!(db.get_value("theme").unwrap().is_none());
    }

    #[test]
    fn test_snapshot_field_names_are_stable() {
        let db = Database::new(":memory:").unwrap();
        db.save_snapshot(&StoreSnapshot::default()).unwrap();

        let document = db.get_value(STORE_KEY).unwrap().unwrap();
        for field in ["\"config\"", "\"topics\"", "\"sessions\"", "\"practiceMode\"", "\"recents\""] {
            assert!(document.contains(field), "missing {}", field);
        }
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let db = Database::new(":memory:").unwrap();
        db.save_value(STORE_KEY, "{not json").unwrap();
        assert!(matches!(
            db.load_snapshot(),
            Err(PersistenceError::Deserialize { .. })
        ));
    }

    #[test]
    fn test_persistent_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("oas.db");

        let block_id = {
            let mut persistent = PersistentStore::open(Database::new(&path).unwrap()).unwrap();
            let topic = persistent.mutate(|s| s.add_topic("Drills", None)).unwrap();
            let block = persistent
                .mutate(|s| s.add_block(topic.id, NewBlock::new("brackets", "({[]})", "text")))
                .unwrap()
                .unwrap();
            persistent
                .mutate(|s| {
                    s.start_session(topic.id, block.id);
                    s.end_session(true).cloned()
                })
                .unwrap();
            persistent
                .mutate(|s| {
                    s.set_practice_mode(PracticeModeUpdate {
                        strict_mode: Some(true),
                        ..PracticeModeUpdate::default()
                    })
                })
                .unwrap();
            block.id
        };

        let reopened = PersistentStore::open(Database::new(&path).unwrap()).unwrap();
        let store = reopened.store();
        assert_eq!(store.topics()[0].blocks[0].code, "({[]})");
        assert_eq!(store.block_sessions(block_id).len(), 1);
        assert!(store.practice_mode().strict_mode);
        assert_eq!(store.config().keyboard_layout, KeyboardLayout::JpMac);
    }
}
