//! 代码写入处理器
//!
//! write_code 动作的本地实现：路径限定在工作目录内，自动创建父目录，
//! 结果携带 meta.filepath 供任务收集产出文件。

use std::path::{Path, PathBuf};

use crate::act::{ActionMeta, ActionResult};

/// write_code 本地处理器
pub struct WriteCodeHandler {
    workspace_root: PathBuf,
}

impl WriteCodeHandler {
    pub fn new(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_path_buf(),
        }
    }

    /// 解析并校验路径必须落在工作目录内
    fn validate_path(&self, file_path: &str) -> Result<PathBuf, String> {
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
            return Err(format!(
                "Access denied: path '{}' is outside workspace",
                file_path
            ));
        }

        Ok(canonical_path)
    }

    /// 写入文件；IO 失败归一为 failure 结果参与反思/重试
    pub fn run(&self, file_path: &str, content: &str, uuid: &str) -> ActionResult {
        let meta = ActionMeta {
            action_type: "write_code".to_string(),
            ..ActionMeta::default()
        };

        let validated_path = match self.validate_path(file_path) {
            Ok(p) => p,
            Err(e) => {
                return ActionResult::failure(
                    uuid,
                    String::new(),
                    ActionMeta {
                        error: Some(e),
                        ..meta
                    },
                )
            }
        };

        if let Some(parent) = validated_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return ActionResult::failure(
                    uuid,
                    String::new(),
                    ActionMeta {
                        error: Some(format!("Failed to create parent directory: {}", e)),
                        ..meta
                    },
                );
            }
        }

        if let Err(e) = std::fs::write(&validated_path, content) {
            return ActionResult::failure(
                uuid,
                String::new(),
                ActionMeta {
                    error: Some(format!("Failed to write file: {}", e)),
                    ..meta
                },
            );
        }

        ActionResult::success(
            uuid,
            format!(
                "Wrote file: {} ({} bytes)",
                validated_path.display(),
                content.len()
            ),
            ActionMeta {
                filepath: Some(validated_path.display().to_string()),
                ..meta
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parents_and_reports_filepath() {
        let dir = tempfile::tempdir().unwrap();
        let handler = WriteCodeHandler::new(dir.path());

        let result = handler.run("Conversation_abc123/src/main.py", "print(1)", "u-1");
        assert!(result.is_success());
        let filepath = result.meta.filepath.unwrap();
        assert!(filepath.ends_with("main.py"));
        assert_eq!(std::fs::read_to_string(filepath).unwrap(), "print(1)");
    }

    #[test]
    fn test_escape_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let handler = WriteCodeHandler::new(dir.path());

        let result = handler.run("../../etc/evil", "x", "u-2");
        assert!(!result.is_success());
        assert!(result.meta.error.unwrap().contains("outside workspace"));
    }
}
