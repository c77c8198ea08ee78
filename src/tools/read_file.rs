//! 文件读取处理器
//!
//! read_file 动作的本地实现：读取前校验路径不逃出工作目录，
//! 逃逸是硬错误（PathEscape），读取失败则是普通 failure 结果。

use std::path::{Path, PathBuf};

use crate::act::{ActionMeta, ActionResult};
use crate::core::AgentError;

/// read_file 本地处理器
pub struct ReadFileHandler {
    workspace_root: PathBuf,
}

impl ReadFileHandler {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    /// 路径限制检查：解析为绝对路径后必须仍在工作目录内
    fn restrict_filepath(&self, file_path: &str) -> Result<PathBuf, AgentError> {
        let path = Path::new(file_path);
        let absolute_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        };

        let canonical_path = match absolute_path.canonicalize() {
            Ok(p) => p,
            Err(_) => absolute_path,
        };

        let allowed_canonical = match self.workspace_root.canonicalize() {
            Ok(p) => p,
            Err(_) => self.workspace_root.clone(),
        };

        if !canonical_path.starts_with(&allowed_canonical) {
            return Err(AgentError::PathEscape(file_path.to_string()));
        }

        Ok(canonical_path)
    }

    /// 读取文件；路径逃逸上抛，IO 失败归一为 failure 结果
    pub fn run(&self, file_path: &str, uuid: &str) -> Result<ActionResult, AgentError> {
        let filepath = self.restrict_filepath(file_path)?;

        let meta = ActionMeta {
            action_type: "read_file".to_string(),
            filepath: Some(filepath.display().to_string()),
            ..ActionMeta::default()
        };

        match std::fs::read_to_string(&filepath) {
            Ok(content) => Ok(ActionResult::success(uuid, content, meta)),
            Err(e) => Ok(ActionResult::failure(
                uuid,
                String::new(),
                ActionMeta {
                    error: Some(format!(
                        "Failed to read file {}: {}",
                        filepath.display(),
                        e
                    )),
                    ..meta
                },
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_workspace() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("note.txt"), "hello").unwrap();
        let handler = ReadFileHandler::new(dir.path());

        let result = handler.run("note.txt", "u-1").unwrap();
        assert!(result.is_success());
        assert_eq!(result.content, "hello");
        assert!(result.meta.filepath.unwrap().ends_with("note.txt"));
    }

    #[test]
    fn test_path_escape_is_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ReadFileHandler::new(dir.path());

        let err = handler.run("../../../etc/passwd", "u-2").unwrap_err();
        assert!(matches!(err, AgentError::PathEscape(_)));
    }

    #[test]
    fn test_missing_file_is_failure_result() {
        let dir = tempfile::tempdir().unwrap();
        let handler = ReadFileHandler::new(dir.path());

        let result = handler.run("nope.txt", "u-3").unwrap();
        assert!(!result.is_success());
        assert!(result.meta.error.unwrap().contains("Failed to read file"));
    }
}
