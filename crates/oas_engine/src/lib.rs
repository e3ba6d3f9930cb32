use log::debug;
use oas_core::*;
use std::sync::mpsc;
use std::time::{Duration, Instant};

pub use oas_core::{Clock, ManualClock, SystemClock};

/// 每个单词按 5 个字符计
const CHARS_PER_WORD: f64 = 5.0;
/// 耗时下限（分钟），避免极短完成时除零
const MIN_ELAPSED_MINUTES: f64 = 0.01;

/// 引擎配置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// 两次按键间隔超过该值即记为停顿点
    pub hesitation_threshold: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hesitation_threshold: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    InProgress,
    Completed,
}

/// 一次编辑的处理结果。
///
/// 收到 `Rejected` 时调用方必须立即把输入框内容恢复为
/// [`TypingSession::buffer`]，否则两边的缓冲区会分叉。
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum EditOutcome {
    /// 会话已完成，编辑被忽略
    Ignored,
    /// 缓冲区为空且没有缩短，没有可比较的字符
    Unchanged,
    Deleted {
        cursor: usize,
    },
    Accepted {
        position: usize,
        completion: Option<Completion>,
    },
    Rejected {
        expected: Option<char>,
        got: char,
    },
}

impl EditOutcome {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    pub fn completion(&self) -> Option<&Completion> {
        match self {
            Self::Accepted { completion, .. } => completion.as_ref(),
            _ => None,
        }
    }
}

pub struct TypingSession<C: Clock = SystemClock> {
    config: EngineConfig,
    clock: C,

    // 目标文本
    target_text: String,
    target_chars: Vec<char>,

    // 输入状态
    buffer: String,
    buffer_len: usize,
    cursor: usize,
    error_count: usize,
    completed: bool,
    wpm: u32,
    completion: Option<Completion>,

    // 计时
    started_at: Option<Instant>,
    last_keystroke_at: Option<Instant>,

    // 记录
    keystrokes: Vec<KeystrokeEvent>,
    hesitation_points: Vec<usize>,
    correct_keystrokes: usize,
    incorrect_keystrokes: usize,

    // 事件发布
    event_tx: Option<mpsc::Sender<TypingEvent>>,
}

impl TypingSession<SystemClock> {
    pub fn new(target: impl Into<String>) -> Self {
        Self::with_clock(target, SystemClock)
    }
}

impl<C: Clock> TypingSession<C> {
    pub fn with_clock(target: impl Into<String>, clock: C) -> Self {
        let target_text = target.into();
        let target_chars = target_text.chars().collect();

        Self {
            config: EngineConfig::default(),
            clock,
            target_text,
            target_chars,
            buffer: String::new(),
            buffer_len: 0,
            cursor: 0,
            error_count: 0,
            completed: false,
            wpm: 0,
            completion: None,
            started_at: None,
            last_keystroke_at: None,
            keystrokes: Vec::new(),
            hesitation_points: Vec::new(),
            correct_keystrokes: 0,
            incorrect_keystrokes: 0,
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_events(mut self, event_tx: mpsc::Sender<TypingEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    /// 换一段目标文本，所有状态回到初始值
    pub fn reset(&mut self, target: impl Into<String>) {
        self.target_text = target.into();
        self.target_chars = self.target_text.chars().collect();
        self.buffer.clear();
        self.buffer_len = 0;
        self.cursor = 0;
        self.error_count = 0;
        self.completed = false;
        self.wpm = 0;
        self.completion = None;
        self.started_at = None;
        self.last_keystroke_at = None;
        self.keystrokes.clear();
        self.hesitation_points.clear();
        self.correct_keystrokes = 0;
        self.incorrect_keystrokes = 0;
    }

    /// 核心方法：处理一次输入框变化，参数为变化后的完整内容
    pub fn apply_edit(&mut self, new_buffer: &str) -> EditOutcome {
        if self.completed {
            return EditOutcome::Ignored;
        }

        let now = self.clock.now();
        let started_at = *self.started_at.get_or_insert(now);
        let new_len = new_buffer.chars().count();

        // 缓冲区变短：视为退格
        if new_len < self.buffer_len {
            self.buffer = new_buffer.to_string();
            self.buffer_len = new_len;
            self.cursor = self.cursor.saturating_sub(1);
            debug!("Engine::apply_edit 退格 -> cursor={}", self.cursor);

            let key = KeystrokeEvent::BACKSPACE.to_string();
            self.record(key, true, self.cursor, now, started_at);
            self.send_event(TypingEvent::Deleted {
                cursor: self.cursor,
            });
            return EditOutcome::Deleted {
                cursor: self.cursor,
            };
        }

        // 粘贴等多字符插入只检查最后一个字符
        let Some(got) = new_buffer.chars().last() else {
            return EditOutcome::Unchanged;
        };
        let position = self.cursor;
        let expected = self.target_chars.get(position).copied();

        debug!(
            "Engine::apply_edit 位置 {}: 目标={:?}, 输入={:?}",
            position, expected, got
        );

        if expected != Some(got) {
            self.error_count += 1;
            self.incorrect_keystrokes += 1;
            self.record(KeystrokeEvent::key_name(got), false, position, now, started_at);
            self.send_event(TypingEvent::KeyRejected {
                char: got,
                expected,
                position,
            });
            return EditOutcome::Rejected { expected, got };
        }

        if let Some(last) = self.last_keystroke_at {
            if now.duration_since(last) > self.config.hesitation_threshold {
                self.hesitation_points.push(position);
            }
        }

        self.buffer = new_buffer.to_string();
        self.buffer_len = new_len;
        self.cursor += 1;
        self.correct_keystrokes += 1;
        self.record(KeystrokeEvent::key_name(got), true, position, now, started_at);
        self.send_event(TypingEvent::KeyAccepted {
            char: got,
            position,
        });

        let completion = if self.cursor == self.target_chars.len() {
            Some(self.complete(now, started_at))
        } else {
            None
        };

        EditOutcome::Accepted {
            position,
            completion,
        }
    }

    fn complete(&mut self, end: Instant, started_at: Instant) -> Completion {
        let duration = end.duration_since(started_at);
        self.wpm = calculate_wpm(self.target_chars.len(), duration);
        self.completed = true;

        let completion = Completion {
            wpm: self.wpm,
            char_count: self.target_chars.len(),
            duration,
            error_count: self.error_count,
        };
        debug!("✅ 会话完成: {:?}", completion);

        self.completion = Some(completion);
        self.send_event(TypingEvent::SessionCompleted { completion });
        completion
    }

    fn record(
        &mut self,
        key: String,
        correct: bool,
        position: usize,
        now: Instant,
        started_at: Instant,
    ) {
        self.keystrokes.push(KeystrokeEvent {
            key,
            timestamp: now.duration_since(started_at).as_millis() as u64,
            correct,
            position,
        });
        self.last_keystroke_at = Some(now);
    }

    pub fn phase(&self) -> SessionPhase {
        if self.completed {
            SessionPhase::Completed
        } else if self.started_at.is_some() {
            SessionPhase::InProgress
        } else {
            SessionPhase::Idle
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn wpm(&self) -> u32 {
        self.wpm
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    /// 最后一次被接受的输入框内容
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn target_text(&self) -> &str {
        &self.target_text
    }

    pub fn target_len(&self) -> usize {
        self.target_chars.len()
    }

    pub fn progress_percent(&self) -> u32 {
        if self.target_chars.is_empty() {
            return 0;
        }
        (100.0 * self.cursor as f64 / self.target_chars.len() as f64).round() as u32
    }

    pub fn is_at_end(&self) -> bool {
        self.cursor == self.target_chars.len()
    }

    pub fn current_expected_char(&self) -> Option<char> {
        self.target_chars.get(self.cursor).copied()
    }

    /// 下一个字符的按键提示
    pub fn current_key_hint(&self, layout: KeyboardLayout) -> Option<&'static str> {
        self.current_expected_char()
            .and_then(|ch| key_hint(ch, layout))
    }

    /// 字符按键的正确率（百分比），退格不计入
    pub fn accuracy(&self) -> f64 {
        let total = self.correct_keystrokes + self.incorrect_keystrokes;
        if total == 0 {
            100.0
        } else {
            100.0 * self.correct_keystrokes as f64 / total as f64
        }
    }

    pub fn keystrokes(&self) -> &[KeystrokeEvent] {
        &self.keystrokes
    }

    pub fn hesitation_points(&self) -> &[usize] {
        &self.hesitation_points
    }

    /// 打包成 store 可以直接写入当前会话的更新
    pub fn session_update(&self) -> SessionUpdate {
        SessionUpdate {
            keystrokes: Some(self.keystrokes.clone()),
            accuracy: Some(self.accuracy()),
            errors_count: Some(self.error_count),
            hesitation_points: Some(self.hesitation_points.clone()),
        }
    }

    fn send_event(&self, event: TypingEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}

/// WPM = (字符数 / 5) / 分钟数，分钟数下限 0.01
pub fn calculate_wpm(char_count: usize, elapsed: Duration) -> u32 {
    let minutes = elapsed.as_secs_f64() / 60.0;
    ((char_count as f64 / CHARS_PER_WORD) / minutes.max(MIN_ELAPSED_MINUTES)).round() as u32
}
