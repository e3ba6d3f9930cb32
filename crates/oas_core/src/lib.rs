use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

pub mod clock;
pub mod content;
pub mod keymap;

pub use clock::{Clock, ManualClock, SystemClock};
pub use content::{Chapter, ChapterStatus, DrillCategory, Subject};
pub use keymap::{is_special_char, key_hint, KeyMapping, Modifier};

pub type TopicId = Uuid;
pub type BlockId = Uuid;
pub type SessionId = Uuid;

/// 难度等级
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Default for Difficulty {
    fn default() -> Self {
        Self::Medium
    }
}

/// 代码块：最小的练习单元，归属于唯一的 TrainingTopic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeBlock {
    pub id: BlockId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<String>,
    /// 影子文本（标准答案）
    pub code: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    pub difficulty: Difficulty,
    /// 练习后解锁的笔记
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// 在所属 topic 内的位置（0..n-1 连续）
    pub order: usize,
}

/// 新建代码块所需的数据（id 与 order 由 store 分配）
#[derive(Debug, Clone, Default)]
pub struct NewBlock {
    pub title: String,
    pub source_reference: Option<String>,
    pub code: String,
    pub language: String,
    pub framework: Option<String>,
    pub difficulty: Difficulty,
    pub notes: Option<String>,
}

impl NewBlock {
    pub fn new(
        title: impl Into<String>,
        code: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            code: code.into(),
            language: language.into(),
            ..Self::default()
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn into_block(self, id: BlockId, order: usize) -> CodeBlock {
        CodeBlock {
            id,
            title: self.title,
            source_reference: self.source_reference,
            code: self.code,
            language: self.language,
            framework: self.framework,
            difficulty: self.difficulty,
            notes: self.notes,
            order,
        }
    }
}

/// 代码块的部分更新，`None` 表示保持原值。
///
/// 可选字段是两层 `Option`：`Some(None)` 清空，`Some(Some(v))` 赋值。
#[derive(Debug, Clone, Default)]
pub struct BlockUpdate {
    pub title: Option<String>,
    pub source_reference: Option<Option<String>>,
    pub code: Option<String>,
    pub language: Option<String>,
    pub framework: Option<Option<String>>,
    pub difficulty: Option<Difficulty>,
    pub notes: Option<Option<String>>,
}

impl BlockUpdate {
    pub fn apply(self, block: &mut CodeBlock) {
        if let Some(title) = self.title {
            block.title = title;
        }
        if let Some(source_reference) = self.source_reference {
            block.source_reference = source_reference;
        }
        if let Some(code) = self.code {
            block.code = code;
        }
        if let Some(language) = self.language {
            block.language = language;
        }
        if let Some(framework) = self.framework {
            block.framework = framework;
        }
        if let Some(difficulty) = self.difficulty {
            block.difficulty = difficulty;
        }
        if let Some(notes) = self.notes {
            block.notes = notes;
        }
    }
}

/// 训练主题：一组有序的代码块
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingTopic {
    pub id: TopicId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub blocks: Vec<CodeBlock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingTopic {
    pub fn block(&self, block_id: BlockId) -> Option<&CodeBlock> {
        self.blocks.iter().find(|b| b.id == block_id)
    }

    /// 重新计算连续的 order，保持现有相对顺序
    pub fn renumber_blocks(&mut self) {
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.order = i;
        }
    }
}

/// 同 [`BlockUpdate`]，`description: Some(None)` 清空描述
#[derive(Debug, Clone, Default)]
pub struct TopicUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

impl TopicUpdate {
    pub fn apply(self, topic: &mut TrainingTopic) {
        if let Some(title) = self.title {
            topic.title = title;
        }
        if let Some(description) = self.description {
            topic.description = description;
        }
    }
}

/// 单次按键记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeystrokeEvent {
    pub key: String,
    /// 距会话第一次输入的毫秒数
    pub timestamp: u64,
    pub correct: bool,
    pub position: usize,
}

impl KeystrokeEvent {
    pub const BACKSPACE: &'static str = "Backspace";
    pub const ENTER: &'static str = "Enter";

    pub fn key_name(ch: char) -> String {
        match ch {
            '\n' => Self::ENTER.to_string(),
            c => c.to_string(),
        }
    }
}

/// 持久化的练习记录（区别于引擎中的实时状态）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSession {
    pub id: SessionId,
    pub block_id: BlockId,
    pub topic_id: TopicId,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub keystrokes: Vec<KeystrokeEvent>,
    /// 百分比 0-100
    pub accuracy: f64,
    /// 毫秒
    pub completion_time: u64,
    pub errors_count: usize,
    /// 停顿超过阈值的字符位置
    pub hesitation_points: Vec<usize>,
    pub completed: bool,
}

impl PracticeSession {
    pub fn new(
        id: SessionId,
        topic_id: TopicId,
        block_id: BlockId,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            block_id,
            topic_id,
            started_at,
            completed_at: None,
            keystrokes: Vec::new(),
            accuracy: 100.0,
            completion_time: 0,
            errors_count: 0,
            hesitation_points: Vec::new(),
            completed: false,
        }
    }
}

/// 进行中会话的部分更新
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub keystrokes: Option<Vec<KeystrokeEvent>>,
    pub accuracy: Option<f64>,
    pub errors_count: Option<usize>,
    pub hesitation_points: Option<Vec<usize>>,
}

impl SessionUpdate {
    pub fn apply(self, session: &mut PracticeSession) {
        if let Some(keystrokes) = self.keystrokes {
            session.keystrokes = keystrokes;
        }
        if let Some(accuracy) = self.accuracy {
            session.accuracy = accuracy;
        }
        if let Some(errors_count) = self.errors_count {
            session.errors_count = errors_count;
        }
        if let Some(hesitation_points) = self.hesitation_points {
            session.hesitation_points = hesitation_points;
        }
    }
}

/// 键盘布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyboardLayout {
    JpMac,
    Us,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortcutLevel {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Course,
    Paper,
    Repo,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockSize {
    Tiny,
    Medium,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Strict,
    Lenient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotesPreference {
    None,
    Inline,
    AfterOnly,
}

/// 用户配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    pub keyboard_layout: KeyboardLayout,
    pub shortcut_level: ShortcutLevel,
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub source_type: SourceType,
    pub block_size: BlockSize,
    pub practice_strictness: Strictness,
    pub notes_preference: NotesPreference,
    pub onboarding_completed: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            keyboard_layout: KeyboardLayout::JpMac,
            shortcut_level: ShortcutLevel::Beginner,
            languages: vec!["python".to_string()],
            frameworks: Vec::new(),
            source_type: SourceType::Course,
            block_size: BlockSize::Medium,
            practice_strictness: Strictness::Lenient,
            notes_preference: NotesPreference::AfterOnly,
            onboarding_completed: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigUpdate {
    pub keyboard_layout: Option<KeyboardLayout>,
    pub shortcut_level: Option<ShortcutLevel>,
    pub languages: Option<Vec<String>>,
    pub frameworks: Option<Vec<String>>,
    pub source_type: Option<SourceType>,
    pub block_size: Option<BlockSize>,
    pub practice_strictness: Option<Strictness>,
    pub notes_preference: Option<NotesPreference>,
    pub onboarding_completed: Option<bool>,
}

impl ConfigUpdate {
    pub fn apply(self, config: &mut UserConfig) {
        if let Some(v) = self.keyboard_layout {
            config.keyboard_layout = v;
        }
        if let Some(v) = self.shortcut_level {
            config.shortcut_level = v;
        }
        if let Some(v) = self.languages {
            config.languages = v;
        }
        if let Some(v) = self.frameworks {
            config.frameworks = v;
        }
        if let Some(v) = self.source_type {
            config.source_type = v;
        }
        if let Some(v) = self.block_size {
            config.block_size = v;
        }
        if let Some(v) = self.practice_strictness {
            config.practice_strictness = v;
        }
        if let Some(v) = self.notes_preference {
            config.notes_preference = v;
        }
        if let Some(v) = self.onboarding_completed {
            config.onboarding_completed = v;
        }
    }
}

/// 练习模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeMode {
    /// false = 记忆模式（隐藏影子文本）
    pub shadow_visible: bool,
    /// true = 必须精确匹配
    pub strict_mode: bool,
}

impl Default for PracticeMode {
    fn default() -> Self {
        Self {
            shadow_visible: true,
            strict_mode: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PracticeModeUpdate {
    pub shadow_visible: Option<bool>,
    pub strict_mode: Option<bool>,
}

impl PracticeModeUpdate {
    pub fn apply(self, mode: &mut PracticeMode) {
        if let Some(v) = self.shadow_visible {
            mode.shadow_visible = v;
        }
        if let Some(v) = self.strict_mode {
            mode.strict_mode = v;
        }
    }
}

/// 完成时向所有者汇报的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Completion {
    pub wpm: u32,
    pub char_count: usize,
    pub duration: Duration,
    pub error_count: usize,
}

/// 打字事件（用于 UI 反馈）
#[derive(Debug, Clone, PartialEq)]
pub enum TypingEvent {
    KeyAccepted {
        char: char,
        position: usize,
    },
    KeyRejected {
        char: char,
        expected: Option<char>,
        position: usize,
    },
    Deleted {
        cursor: usize,
    },
    SessionCompleted {
        completion: Completion,
    },
}
