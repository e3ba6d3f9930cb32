//! 练习记录 store
//!
//! 只包含纯内存的状态变换：主题 / 代码块的增删改查、当前会话槽位、
//! 只追加的历史记录。持久化通过 [`persist`] 中的适配层完成，
//! 每次变换后由外部快照保存。

use chrono::Utc;
use log::{debug, warn};
use oas_core::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

pub mod persist;

pub use persist::{MemoryStorage, PersistentStore, SnapshotStorage};

/// 最近练习的临时片段数量上限
pub const MAX_RECENTS: usize = 5;

/// 需要持久化的部分，字段名保持稳定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSnapshot {
    pub config: UserConfig,
    pub topics: Vec<TrainingTopic>,
    pub sessions: Vec<PracticeSession>,
    pub practice_mode: PracticeMode,
    pub recents: Vec<String>,
}

/// 进行中的会话，耗时用单调时钟计算
#[derive(Debug, Clone)]
struct ActiveSession {
    record: PracticeSession,
    started: Instant,
}

/// 单个代码块的历史汇总
#[derive(Debug, Clone, PartialEq)]
pub struct BlockStats {
    pub attempts: usize,
    pub completions: usize,
    /// 已完成会话中的最短耗时（毫秒）
    pub best_completion_time: Option<u64>,
    pub average_accuracy: Option<f64>,
}

/// 耗时通过 [`Clock`] 读取，默认是单调的 [`SystemClock`]
#[derive(Debug, Default)]
pub struct Store<C: Clock = SystemClock> {
    clock: C,
    config: UserConfig,
    topics: Vec<TrainingTopic>,
    sessions: Vec<PracticeSession>,
    current: Option<ActiveSession>,
    practice_mode: PracticeMode,
    recents: Vec<String>,
}

impl Store<SystemClock> {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从快照恢复；当前会话不持久化
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self::from_snapshot_with_clock(snapshot, SystemClock)
    }
}

impl<C: Clock> Store<C> {
    pub fn with_clock(clock: C) -> Self {
        Self::from_snapshot_with_clock(StoreSnapshot::default(), clock)
    }

    pub fn from_snapshot_with_clock(snapshot: StoreSnapshot, clock: C) -> Self {
        Self {
            clock,
            config: snapshot.config,
            topics: snapshot.topics,
            sessions: snapshot.sessions,
            current: None,
            practice_mode: snapshot.practice_mode,
            recents: snapshot.recents,
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            config: self.config.clone(),
            topics: self.topics.clone(),
            sessions: self.sessions.clone(),
            practice_mode: self.practice_mode,
            recents: self.recents.clone(),
        }
    }

    // ---- 用户配置 ----

    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    pub fn set_config(&mut self, updates: ConfigUpdate) {
        updates.apply(&mut self.config);
    }

    pub fn complete_onboarding(&mut self) {
        self.config.onboarding_completed = true;
    }

    // ---- 主题 ----

    pub fn topics(&self) -> &[TrainingTopic] {
        &self.topics
    }

    pub fn topic(&self, id: TopicId) -> Option<&TrainingTopic> {
        self.topics.iter().find(|t| t.id == id)
    }

    fn topic_mut(&mut self, id: TopicId) -> Option<&mut TrainingTopic> {
        self.topics.iter_mut().find(|t| t.id == id)
    }

    pub fn add_topic(
        &mut self,
        title: impl Into<String>,
        description: Option<String>,
    ) -> TrainingTopic {
        let now = Utc::now();
        let topic = TrainingTopic {
            id: Uuid::new_v4(),
            title: title.into(),
            description,
            blocks: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        debug!("Store::add_topic {} ({})", topic.title, topic.id);

        self.topics.push(topic.clone());
        topic
    }

    /// 找不到 id 时静默忽略
    pub fn update_topic(&mut self, id: TopicId, updates: TopicUpdate) {
        if let Some(topic) = self.topic_mut(id) {
            updates.apply(topic);
            topic.updated_at = Utc::now();
        }
    }

    pub fn delete_topic(&mut self, id: TopicId) {
        self.topics.retain(|t| t.id != id);
    }

    // ---- 代码块 ----

    pub fn block(&self, topic_id: TopicId, block_id: BlockId) -> Option<&CodeBlock> {
        self.topic(topic_id)?.block(block_id)
    }

    /// topic 不存在时返回 None
    pub fn add_block(&mut self, topic_id: TopicId, data: NewBlock) -> Option<CodeBlock> {
        let topic = self.topic_mut(topic_id)?;
        let block = data.into_block(Uuid::new_v4(), topic.blocks.len());
        debug!("Store::add_block {} -> topic {}", block.id, topic_id);

        topic.blocks.push(block.clone());
        topic.updated_at = Utc::now();
        Some(block)
    }

    pub fn update_block(&mut self, topic_id: TopicId, block_id: BlockId, updates: BlockUpdate) {
        if let Some(topic) = self.topic_mut(topic_id) {
            if let Some(block) = topic.blocks.iter_mut().find(|b| b.id == block_id) {
                updates.apply(block);
            }
            topic.updated_at = Utc::now();
        }
    }

    pub fn delete_block(&mut self, topic_id: TopicId, block_id: BlockId) {
        if let Some(topic) = self.topic_mut(topic_id) {
            topic.blocks.retain(|b| b.id != block_id);
            topic.renumber_blocks();
            topic.updated_at = Utc::now();
        }
    }

    /// 按给定 id 顺序重排。
    ///
    /// 列表里没有出现的代码块会从 topic 中移除并返回给调用方；
    /// 不属于该 topic 的 id 和重复的 id 被忽略。
    pub fn reorder_blocks(&mut self, topic_id: TopicId, block_ids: &[BlockId]) -> Vec<CodeBlock> {
        let Some(topic) = self.topic_mut(topic_id) else {
            return Vec::new();
        };

        let mut remaining: Vec<Option<CodeBlock>> = topic.blocks.drain(..).map(Some).collect();
        let mut reordered = Vec::with_capacity(block_ids.len());
        for id in block_ids {
            let slot = remaining
                .iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|b| b.id == *id));
            if let Some(mut block) = slot.and_then(Option::take) {
                block.order = reordered.len();
                reordered.push(block);
            }
        }

        topic.blocks = reordered;
        topic.updated_at = Utc::now();

        let dropped: Vec<CodeBlock> = remaining.into_iter().flatten().collect();
        if !dropped.is_empty() {
            warn!(
                "Store::reorder_blocks 移除了 {} 个未列出的代码块 (topic {})",
                dropped.len(),
                topic_id
            );
        }
        dropped
    }

    // ---- 练习会话 ----

    pub fn sessions(&self) -> &[PracticeSession] {
        &self.sessions
    }

    pub fn current_session(&self) -> Option<&PracticeSession> {
        self.current.as_ref().map(|a| &a.record)
    }

    /// 开始新会话。未结束的旧会话被放弃，不写入历史。
    pub fn start_session(&mut self, topic_id: TopicId, block_id: BlockId) -> PracticeSession {
        self.abandon_session();

        let record = PracticeSession::new(Uuid::new_v4(), topic_id, block_id, Utc::now());
        debug!("Store::start_session {} (block {})", record.id, block_id);

        self.current = Some(ActiveSession {
            record: record.clone(),
            started: self.clock.now(),
        });
        record
    }

    /// 丢弃当前会话，不记录
    pub fn abandon_session(&mut self) -> Option<PracticeSession> {
        let abandoned = self.current.take()?.record;
        warn!("Store::abandon_session 丢弃未结束的会话 {}", abandoned.id);
        Some(abandoned)
    }

    pub fn update_session(&mut self, updates: SessionUpdate) {
        if let Some(active) = self.current.as_mut() {
            updates.apply(&mut active.record);
        }
    }

    /// 结束当前会话并追加到历史；没有当前会话时什么都不做
    pub fn end_session(&mut self, completed: bool) -> Option<&PracticeSession> {
        let ActiveSession {
            mut record,
            started,
        } = self.current.take()?;

        record.completed_at = Some(Utc::now());
        record.completed = completed;
        record.completion_time = self
            .clock
            .now()
            .saturating_duration_since(started)
            .as_millis() as u64;
        debug!(
            "Store::end_session {} completed={} time={}ms",
            record.id, record.completed, record.completion_time
        );

        self.sessions.push(record);
        self.sessions.last()
    }

    /// 某个代码块的全部历史，保持插入顺序
    pub fn block_sessions(&self, block_id: BlockId) -> Vec<&PracticeSession> {
        self.sessions.iter().filter(|s| s.block_id == block_id).collect()
    }

    pub fn block_stats(&self, block_id: BlockId) -> BlockStats {
        let sessions = self.block_sessions(block_id);
        let completed: Vec<_> = sessions.iter().filter(|s| s.completed).collect();

        let average_accuracy = if sessions.is_empty() {
            None
        } else {
            Some(sessions.iter().map(|s| s.accuracy).sum::<f64>() / sessions.len() as f64)
        };

        BlockStats {
            attempts: sessions.len(),
            completions: completed.len(),
            best_completion_time: completed.iter().map(|s| s.completion_time).min(),
            average_accuracy,
        }
    }

    // ---- 练习模式 ----

    pub fn practice_mode(&self) -> PracticeMode {
        self.practice_mode
    }

    pub fn set_practice_mode(&mut self, updates: PracticeModeUpdate) {
        updates.apply(&mut self.practice_mode);
    }

    // ---- 最近练习的片段 ----

    pub fn recents(&self) -> &[String] {
        &self.recents
    }

    /// 记录一段临时练习文本：去掉首尾空白、去重、最新的在前
    pub fn remember_snippet(&mut self, snippet: &str) {
        let snippet = snippet.trim();
        if snippet.is_empty() {
            return;
        }
        self.recents.retain(|r| r != snippet);
        self.recents.insert(0, snippet.to_string());
        self.recents.truncate(MAX_RECENTS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oas_engine::TypingSession;
    use std::time::Duration;

    fn store_with_blocks(n: usize) -> (Store, TopicId, Vec<BlockId>) {
        let mut store = Store::new();
        let topic = store.add_topic("Python", None);
        let ids = (0..n)
            .map(|i| {
                let data = NewBlock::new(format!("b{}", i), format!("x = {}", i), "python");
                store.add_block(topic.id, data).unwrap().id
            })
            .collect();
        (store, topic.id, ids)
    }

    fn orders(store: &Store, topic_id: TopicId) -> Vec<(BlockId, usize)> {
        store
            .topic(topic_id)
            .unwrap()
            .blocks
            .iter()
            .map(|b| (b.id, b.order))
            .collect()
    }

    #[test]
    fn test_add_topic() {
        let mut store = Store::new();
        let topic = store.add_topic("A", Some("first".to_string()));
        assert!(topic.blocks.is_empty());
        assert_eq!(topic.created_at, topic.updated_at);
        assert_eq!(store.topic(topic.id), Some(&topic));

        let other = store.add_topic("B", None);
        assert_ne!(topic.id, other.id);
        assert_eq!(store.topics().len(), 2);
    }

    #[test]
    fn test_update_and_delete_topic() {
        let mut store = Store::new();
        let topic = store.add_topic("A", None);
        store.update_topic(
            topic.id,
            TopicUpdate {
                title: Some("A2".to_string()),
                description: None,
            },
        );
        let updated = store.topic(topic.id).unwrap();
        assert_eq!(updated.title, "A2");
        assert!(updated.updated_at >= topic.updated_at);

        store.update_topic(
            topic.id,
            TopicUpdate {
                title: None,
                description: Some(Some("loops".to_string())),
            },
        );
        assert_eq!(store.topic(topic.id).unwrap().description.as_deref(), Some("loops"));
        store.update_topic(
            topic.id,
            TopicUpdate {
                title: None,
                description: Some(None),
            },
        );
        let cleared = store.topic(topic.id).unwrap();
        assert!(cleared.description.is_none());
        assert_eq!(cleared.title, "A2");

        // 未知 id 静默忽略
        store.update_topic(Uuid::new_v4(), TopicUpdate::default());
        store.delete_topic(Uuid::new_v4());
        assert_eq!(store.topics().len(), 1);

        store.delete_topic(topic.id);
        assert!(store.topics().is_empty());
    }

    #[test]
    fn test_add_block_to_missing_topic() {
        let mut store = Store::new();
        assert!(store
            .add_block(Uuid::new_v4(), NewBlock::new("t", "code", "python"))
            .is_none());
    }

    #[test]
    fn test_add_block_assigns_order() {
        let (store, topic_id, ids) = store_with_blocks(3);
        assert_eq!(
            orders(&store, topic_id),
            vec![(ids[0], 0), (ids[1], 1), (ids[2], 2)]
        );
        assert_eq!(store.block(topic_id, ids[1]).unwrap().code, "x = 1");
    }

    #[test]
    fn test_add_then_delete_block() {
        let mut store = Store::new();
        let topic = store.add_topic("A", None);
        let block = store
            .add_block(topic.id, NewBlock::new("t", "print(1)", "python"))
            .unwrap();
        store.delete_block(topic.id, block.id);
        assert!(store.topic(topic.id).unwrap().blocks.is_empty());
    }

    #[test]
    fn test_delete_block_renumbers() {
        let (mut store, topic_id, ids) = store_with_blocks(4);
        store.delete_block(topic_id, ids[1]);
        assert_eq!(
            orders(&store, topic_id),
            vec![(ids[0], 0), (ids[2], 1), (ids[3], 2)]
        );
    }

    #[test]
    fn test_update_block() {
        let (mut store, topic_id, ids) = store_with_blocks(1);
        store.update_block(
            topic_id,
            ids[0],
            BlockUpdate {
                notes: Some(Some("remember str()".to_string())),
                ..BlockUpdate::default()
            },
        );
        let block = store.block(topic_id, ids[0]).unwrap();
        assert_eq!(block.notes.as_deref(), Some("remember str()"));
        assert_eq!(block.order, 0);
    }

    #[test]
    fn test_reorder_blocks() {
        let (mut store, topic_id, ids) = store_with_blocks(3);
        let dropped = store.reorder_blocks(topic_id, &[ids[2], ids[0], ids[1]]);
        assert!(dropped.is_empty());
        assert_eq!(
            orders(&store, topic_id),
            vec![(ids[2], 0), (ids[0], 1), (ids[1], 2)]
        );
    }

    #[test]
    fn test_reorder_partial_list_drops_missing_block() {
        let (mut store, topic_id, ids) = store_with_blocks(3);
        let dropped = store.reorder_blocks(topic_id, &[ids[2], Uuid::new_v4(), ids[0], ids[0]]);

        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id, ids[1]);
        assert_eq!(orders(&store, topic_id), vec![(ids[2], 0), (ids[0], 1)]);
        assert!(store.block(topic_id, ids[1]).is_none());
    }

    #[test]
    fn test_reorder_unknown_topic() {
        let (mut store, topic_id, ids) = store_with_blocks(2);
        assert!(store.reorder_blocks(Uuid::new_v4(), &[]).is_empty());
        assert_eq!(orders(&store, topic_id).len(), ids.len());
    }

    #[test]
    fn test_session_lifecycle() {
        let (mut store, topic_id, ids) = store_with_blocks(1);
        let session = store.start_session(topic_id, ids[0]);
        assert!(!session.completed);
        assert_eq!(session.accuracy, 100.0);
        assert_eq!(store.current_session(), Some(&session));

        store.update_session(SessionUpdate {
            errors_count: Some(2),
            accuracy: Some(90.0),
            ..SessionUpdate::default()
        });

        let ended = store.end_session(true).cloned().unwrap();
        assert!(ended.completed);
        assert!(ended.completed_at.is_some());
        assert_eq!(ended.errors_count, 2);
        assert_eq!(ended.id, session.id);
        assert!(store.current_session().is_none());
        assert_eq!(store.sessions(), &[ended]);
    }

    #[test]
    fn test_completion_time_from_clock() {
        let clock = ManualClock::new();
        let mut store = Store::with_clock(clock.clone());
        let topic = store.add_topic("A", None);
        let block = store
            .add_block(topic.id, NewBlock::new("t", "x = 1", "python"))
            .unwrap();

        store.start_session(topic.id, block.id);
        clock.advance(Duration::from_millis(1500));
        let record = store.end_session(true).cloned().unwrap();
        assert_eq!(record.completion_time, 1500);

        // 放弃的会话不计时，下一次从新的起点开始
        store.start_session(topic.id, block.id);
        clock.advance(Duration::from_secs(10));
        store.start_session(topic.id, block.id);
        clock.advance(Duration::from_millis(700));
        store.end_session(false);

        let stats = store.block_stats(block.id);
        assert_eq!(store.sessions()[1].completion_time, 700);
        assert_eq!(stats.best_completion_time, Some(1500));
    }

    #[test]
    fn test_end_without_session_is_noop() {
        let mut store = Store::new();
        assert!(store.end_session(true).is_none());
        store.update_session(SessionUpdate::default());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_double_start_abandons_first() {
        let (mut store, topic_id, ids) = store_with_blocks(1);
        let first = store.start_session(topic_id, ids[0]);
        let second = store.start_session(topic_id, ids[0]);
        assert_ne!(first.id, second.id);
        assert!(store.sessions().is_empty());

        store.end_session(false);
        let history = store.block_sessions(ids[0]);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, second.id);
        assert!(!history[0].completed);
    }

    #[test]
    fn test_abandon_session() {
        let (mut store, topic_id, ids) = store_with_blocks(1);
        let session = store.start_session(topic_id, ids[0]);
        assert_eq!(store.abandon_session().map(|s| s.id), Some(session.id));
        assert!(store.abandon_session().is_none());
        assert!(store.sessions().is_empty());
    }

    #[test]
    fn test_block_sessions_keep_insertion_order() {
        let (mut store, topic_id, ids) = store_with_blocks(2);
        let mut expected = Vec::new();
        for i in 0..3 {
            expected.push(store.start_session(topic_id, ids[0]).id);
            store.end_session(i % 2 == 0);
            store.start_session(topic_id, ids[1]);
            store.end_session(true);
        }
        let history: Vec<_> = store.block_sessions(ids[0]).iter().map(|s| s.id).collect();
        assert_eq!(history, expected);
        assert_eq!(store.sessions().len(), 6);
    }

    #[test]
    fn test_block_stats() {
        let (mut store, topic_id, ids) = store_with_blocks(1);
        assert_eq!(
            store.block_stats(ids[0]),
            BlockStats {
                attempts: 0,
                completions: 0,
                best_completion_time: None,
                average_accuracy: None,
            }
        );

        for (accuracy, completed) in [(80.0, false), (100.0, true)] {
            store.start_session(topic_id, ids[0]);
            store.update_session(SessionUpdate {
                accuracy: Some(accuracy),
                ..SessionUpdate::default()
            });
            store.end_session(completed);
        }

        let stats = store.block_stats(ids[0]);
        assert_eq!(stats.attempts, 2);
        assert_eq!(stats.completions, 1);
        assert!(stats.best_completion_time.is_some());
        assert_eq!(stats.average_accuracy, Some(90.0));
    }

    #[test]
    fn test_engine_feeds_session_record() {
        let (mut store, topic_id, ids) = store_with_blocks(1);
        let code = store.block(topic_id, ids[0]).unwrap().code.clone();

        store.start_session(topic_id, ids[0]);
        let mut engine = TypingSession::with_clock(code.as_str(), ManualClock::new());
        let mut buffer = String::new();
        for ch in code.chars() {
            if ch == '=' {
                // 先按错一次
                let _ = engine.apply_edit(&format!("{}-", buffer));
            }
            buffer.push(ch);
            let _ = engine.apply_edit(&buffer);
        }
        assert!(engine.is_completed());

        store.update_session(engine.session_update());
        let record = store.end_session(engine.is_completed()).cloned().unwrap();
        assert!(record.completed);
        assert_eq!(record.errors_count, 1);
        assert_eq!(record.keystrokes.len(), code.chars().count() + 1);
        assert!(record.accuracy < 100.0);
    }

    #[test]
    fn test_config_and_practice_mode() {
        let mut store = Store::new();
        assert_eq!(store.config().keyboard_layout, KeyboardLayout::JpMac);

        store.set_config(ConfigUpdate {
            keyboard_layout: Some(KeyboardLayout::Us),
            languages: Some(vec!["rust".to_string()]),
            ..ConfigUpdate::default()
        });
        store.complete_onboarding();
        assert_eq!(store.config().keyboard_layout, KeyboardLayout::Us);
        assert_eq!(store.config().languages, ["rust"]);
        assert!(store.config().onboarding_completed);
        assert_eq!(store.config().block_size, BlockSize::Medium);

        store.set_practice_mode(PracticeModeUpdate {
            shadow_visible: Some(false),
            strict_mode: None,
        });
        assert!(!store.practice_mode().shadow_visible);
        assert!(!store.practice_mode().strict_mode);
    }

    #[test]
    fn test_remember_snippet() {
        let mut store = Store::new();
        for s in ["a", "b", "  c  ", "", "d", "e", "f", "b"] {
            store.remember_snippet(s);
        }
        assert_eq!(store.recents(), ["b", "f", "e", "d", "c"]);
    }

    #[test]
    fn test_snapshot_roundtrip_drops_current_session() {
        let (mut store, topic_id, ids) = store_with_blocks(2);
        store.start_session(topic_id, ids[0]);
        store.end_session(true);
        store.start_session(topic_id, ids[1]);
        store.remember_snippet("print(1)");

        let snapshot = store.snapshot();
        let text = ron::to_string(&snapshot.topics).unwrap();
        let topics: Vec<TrainingTopic> = ron::from_str(&text).unwrap();
        assert_eq!(topics, snapshot.topics);

        let restored = Store::from_snapshot(snapshot.clone());
        assert!(restored.current_session().is_none());
        assert_eq!(restored.snapshot(), snapshot);
        assert_eq!(restored.sessions().len(), 1);
    }
}
