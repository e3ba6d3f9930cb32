use anyhow::{Context, Result};
use log::{debug, info, warn};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use oas_core::{Chapter, DrillCategory, Subject};
use rust_embed::RustEmbed;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

/// 嵌入式练习内容
#[derive(RustEmbed)]
#[folder = "../../content"]
#[include = "*.ron"]
struct EmbeddedContent;

const CURRICULUM_DIR: &str = "curriculum";
const DRILLS_DIR: &str = "drills";
const CONTENT_EXT: &str = "ron";

fn is_content_file(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some(CONTENT_EXT)
}

/// 可按 id 覆盖、按 order 排序的内容
trait ContentItem: DeserializeOwned {
    fn id(&self) -> &str;
    fn order(&self) -> u32;
}

impl ContentItem for Subject {
    fn id(&self) -> &str {
        &self.id
    }

    fn order(&self) -> u32 {
        self.order
    }
}

impl ContentItem for DrillCategory {
    fn id(&self) -> &str {
        &self.id
    }

    fn order(&self) -> u32 {
        self.order
    }
}

pub struct ContentLoader {
    user_data_dir: PathBuf,
    watcher: Option<RecommendedWatcher>,
}

impl ContentLoader {
    /// 使用系统数据目录
    pub fn new() -> Result<Self> {
        Self::with_user_dir(Self::get_user_data_dir()?)
    }

    pub fn with_user_dir(user_data_dir: impl Into<PathBuf>) -> Result<Self> {
        let user_data_dir = user_data_dir.into();

        // 确保用户数据目录存在
        if !user_data_dir.exists() {
            fs::create_dir_all(&user_data_dir)
                .with_context(|| format!("Failed to create user data dir: {:?}", user_data_dir))?;
            debug!("✅ 创建用户数据目录: {:?}", user_data_dir);
        }

        Ok(Self {
            user_data_dir,
            watcher: None,
        })
    }

    /// 获取系统数据目录
    fn get_user_data_dir() -> Result<PathBuf> {
        #[cfg(target_os = "windows")]
        let base = dirs::data_dir().ok_or_else(|| anyhow::anyhow!("无法获取数据目录"))?;

        #[cfg(not(target_os = "windows"))]
        let base = dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("无法获取数据目录"))?;

        Ok(base.join("OAS").join("content"))
    }

    /// 加载所有学科（用户目录覆盖内置资源）
    pub fn load_subjects(&self) -> Result<Vec<Subject>> {
        self.load_merged(CURRICULUM_DIR)
    }

    /// 加载所有符号练习
    pub fn load_drills(&self) -> Result<Vec<DrillCategory>> {
        self.load_merged(DRILLS_DIR)
    }

    pub fn subject(&self, id: &str) -> Result<Subject> {
        self.load_subjects()?
            .into_iter()
            .find(|s| s.id == id)
            .ok_or_else(|| anyhow::anyhow!("Subject with id {} not found", id))
    }

    pub fn chapter(&self, subject_id: &str, chapter_id: &str) -> Result<Chapter> {
        let subject = self.subject(subject_id)?;
        subject.chapter(chapter_id).cloned().ok_or_else(|| {
            anyhow::anyhow!("Chapter {} not found in subject {}", chapter_id, subject_id)
        })
    }

    pub fn drill(&self, id: &str) -> Result<DrillCategory> {
        self.load_drills()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| anyhow::anyhow!("Drill with id {} not found", id))
    }

    fn load_merged<T: ContentItem>(&self, subdir: &str) -> Result<Vec<T>> {
        let mut items: HashMap<String, T> = HashMap::new();

        // 1. 先加载嵌入式内置内容
        let builtin: Vec<T> = Self::load_embedded(subdir)?;
        debug!("📚 加载嵌入式 {}: {} 个", subdir, builtin.len());
        for item in builtin {
            items.insert(item.id().to_string(), item);
        }

        // 2. 再加载用户内容（覆盖同 id 的内置内容）
        let mut user_items: Vec<T> = Vec::new();
        Self::load_from_dir_recursive(&self.user_data_dir.join(subdir), &mut user_items)?;
        if !user_items.is_empty() {
            info!("📚 加载用户 {}: {} 个", subdir, user_items.len());
        }
        for item in user_items {
            if items.contains_key(item.id()) {
                debug!("🔄 用户内容覆盖内置 id: {}", item.id());
            }
            items.insert(item.id().to_string(), item);
        }

        // 3. 排序返回
        let mut items: Vec<_> = items.into_values().collect();
        items.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
        Ok(items)
    }

    fn load_embedded<T: ContentItem>(subdir: &str) -> Result<Vec<T>> {
        let prefix = format!("{}/", subdir);
        let mut items = Vec::new();

        for file in EmbeddedContent::iter() {
            let file_name = file.as_ref();
            if !file_name.starts_with(&prefix) || !is_content_file(Path::new(file_name)) {
                continue;
            }

            if let Some(content) = EmbeddedContent::get(file_name) {
                let content_str = std::str::from_utf8(&content.data)
                    .with_context(|| format!("Failed to decode embedded file: {}", file_name))?;

                let item: T = ron::from_str(content_str)
                    .with_context(|| format!("Failed to parse embedded content: {}", file_name))?;

                items.push(item);
            }
        }

        Ok(items)
    }

    /// 递归加载目录中的所有 .ron 文件
    fn load_from_dir_recursive<T: ContentItem>(dir: &Path, items: &mut Vec<T>) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }

        for entry in
            fs::read_dir(dir).with_context(|| format!("Failed to read directory: {:?}", dir))?
        {
            let entry = entry?;
            let path = entry.path();

            if path.is_dir() {
                Self::load_from_dir_recursive(&path, items)?;
            } else if is_content_file(&path) {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read: {:?}", path))?;
                let item: T = ron::from_str(&content)
                    .with_context(|| format!("Failed to parse: {:?}", path))?;
                items.push(item);
            }
        }

        Ok(())
    }

    /// 监听用户数据目录，`.ron` 文件变化时在后台线程回调。
    ///
    /// 再次调用会替换之前的监听；loader 被 drop 后回调线程随之退出。
    pub fn start_watching<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        let (tx, rx) = channel();

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) if event.paths.iter().any(|p| is_content_file(p)) => {
                    debug!("📂 用户内容变化 {:?}: {:?}", event.kind, event.paths);
                    tx.send(()).ok();
                }
                Ok(_) => {}
                Err(e) => warn!("内容目录监听出错: {}", e),
            }
        })
        .context("Failed to create content watcher")?;

        watcher
            .watch(&self.user_data_dir, RecursiveMode::Recursive)
            .with_context(|| format!("Failed to watch: {:?}", self.user_data_dir))?;
        info!("👀 开始监听用户内容目录: {:?}", self.user_data_dir);

        std::thread::spawn(move || {
            while rx.recv().is_ok() {
                callback();
            }
        });

        self.watcher = Some(watcher);
        Ok(())
    }

    pub fn user_data_dir(&self) -> &Path {
        &self.user_data_dir
    }
}
