//! 任务记忆：按任务 key 追加的消息日志
//!
//! 调度器把成功结果写回记忆，仅标记为 memorized 的类型（如 read_file）参与
//! 最终摘要；可选 JSON 文件持久化，跨进程恢复同一任务的记忆。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// 单条记忆：角色、内容、来源动作类型与是否参与摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(default)]
    pub memorized: bool,
}

/// 按任务 key 的追加式记忆日志
#[derive(Debug, Default)]
pub struct LocalMemory {
    key: String,
    entries: Vec<MemoryEntry>,
    /// 持久化文件路径；None 时仅驻留内存
    path: Option<PathBuf>,
}

impl LocalMemory {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: Vec::new(),
            path: None,
        }
    }

    /// 启用持久化：<dir>/memory_<key>.json，文件存在时加载历史
    pub fn with_persistence(mut self, dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(format!("memory_{}.json", self.key));
        if path.exists() {
            if let Ok(data) = std::fs::read_to_string(&path) {
                if let Ok(entries) = serde_json::from_str::<Vec<MemoryEntry>>(&data) {
                    self.entries = entries;
                }
            }
        }
        self.path = Some(path);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// 追加一条消息；持久化开启时尽力写盘，失败只记日志不中断任务
    pub fn add_message(
        &mut self,
        role: &str,
        content: &str,
        action_type: Option<&str>,
        memorized: bool,
    ) {
        self.entries.push(MemoryEntry {
            role: role.to_string(),
            content: content.to_string(),
            action_type: action_type.map(String::from),
            memorized,
        });
        if let Err(e) = self.save() {
            tracing::warn!(error = %e, "memory persistence failed");
        }
    }

    /// 标记为 memorized 的内容拼接，作为任务完成时的记忆摘要
    pub fn memorized_content(&self) -> String {
        self.entries
            .iter()
            .filter(|e| e.memorized)
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    fn save(&self) -> anyhow::Result<()> {
        let Some(ref path) = self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&self.entries)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memorized_content_filters() {
        let mut memory = LocalMemory::new("t1");
        memory.add_message("user", "file body", Some("read_file"), true);
        memory.add_message("user", "command output", Some("terminal_run"), false);
        memory.add_message("user", "another file", Some("read_file"), true);
        assert_eq!(memory.memorized_content(), "file body\nanother file");
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut memory = LocalMemory::new("t2").with_persistence(dir.path());
            memory.add_message("user", "hello", None, true);
        }
        let restored = LocalMemory::new("t2").with_persistence(dir.path());
        assert_eq!(restored.entries().len(), 1);
        assert_eq!(restored.memorized_content(), "hello");
    }
}
