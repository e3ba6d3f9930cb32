use serde::{Deserialize, Serialize};

/// 章节状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChapterStatus {
    Locked,
    Open,
    Completed,
}

/// 课程路线中的一个章节
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub title: String,
    pub status: ChapterStatus,
    #[serde(default)]
    pub description: Option<String>,
    /// 练习的目标文本
    #[serde(default)]
    pub content: Option<String>,
}

impl Chapter {
    /// 未锁定且有内容才能练习
    pub fn is_practicable(&self) -> bool {
        self.status != ChapterStatus::Locked
            && self.content.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// 学科（例如 Python、PyTorch）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub order: u32,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Subject {
    pub fn chapter(&self, chapter_id: &str) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == chapter_id)
    }
}

/// 符号专项练习
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillCategory {
    pub id: String,
    #[serde(default)]
    pub order: u32,
    pub title: String,
    pub goal: String,
    pub snippets: Vec<String>,
}

impl DrillCategory {
    pub fn snippet(&self, index: usize) -> Option<&str> {
        self.snippets.get(index).map(String::as_str)
    }

    /// 下一段的下标，最后一段之后返回 None
    pub fn next_index(&self, index: usize) -> Option<usize> {
        let next = index + 1;
        (next < self.snippets.len()).then_some(next)
    }
}
