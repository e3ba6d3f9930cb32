use crate::{Store, StoreSnapshot};
use anyhow::{Context, Result};
use log::{debug, info};

/// 持久层：启动时读取快照，每次变换后写回
pub trait SnapshotStorage {
    fn load(&mut self) -> Result<Option<StoreSnapshot>>;
    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<()>;
}

/// 内存实现，主要用于测试
#[derive(Debug, Default)]
pub struct MemoryStorage {
    snapshot: Option<StoreSnapshot>,
    saves: usize,
}

impl MemoryStorage {
    pub fn with_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            saves: 0,
        }
    }

    pub fn snapshot(&self) -> Option<&StoreSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SnapshotStorage for MemoryStorage {
    fn load(&mut self) -> Result<Option<StoreSnapshot>> {
        Ok(self.snapshot.clone())
    }

    fn save(&mut self, snapshot: &StoreSnapshot) -> Result<()> {
        self.snapshot = Some(snapshot.clone());
        self.saves += 1;
        Ok(())
    }
}

/// 带持久化的 store：所有变换都经过 [`PersistentStore::mutate`]，
/// 变换完成后同步保存一次快照
pub struct PersistentStore<S: SnapshotStorage> {
    store: Store,
    storage: S,
}

impl<S: SnapshotStorage> PersistentStore<S> {
    pub fn open(mut storage: S) -> Result<Self> {
        let store = match storage.load().context("Failed to load store snapshot")? {
            Some(snapshot) => {
                info!(
                    "📦 恢复 store: {} 个主题, {} 条练习记录",
                    snapshot.topics.len(),
                    snapshot.sessions.len()
                );
                Store::from_snapshot(snapshot)
            }
            None => Store::new(),
        };

        Ok(Self { store, storage })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Store) -> R) -> Result<R> {
        let result = f(&mut self.store);
        self.storage
            .save(&self.store.snapshot())
            .context("Failed to save store snapshot")?;
        debug!("💾 store 快照已保存");
        Ok(result)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_parts(self) -> (Store, S) {
        (self.store, self.storage)
    }
}
