//! 过程进度消息：用于流式/持久化展示动作的运行与结果
//!
//! 每条记录以动作 uuid 为关联键；发送端缺失或接收端关闭时静默丢弃（尽力而为）。

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

/// 归一化的进度记录（可序列化为 JSON 供前端展示或落库）
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    /// running / success / failure
    pub status: String,
    pub content: String,
    pub action_type: String,
    pub task_id: String,
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memorized: Option<String>,
    /// 毫秒时间戳
    pub timestamp: i64,
}

impl ProgressUpdate {
    pub fn new(
        status: &str,
        content: impl Into<String>,
        action_type: &str,
        task_id: &str,
        uuid: &str,
    ) -> Self {
        Self {
            status: status.to_string(),
            content: content.into(),
            action_type: action_type.to_string(),
            task_id: task_id.to_string(),
            uuid: uuid.to_string(),
            url: None,
            json: None,
            filepath: None,
            comments: None,
            memorized: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn with_json(mut self, json: Option<Value>) -> Self {
        self.json = json;
        self
    }

    pub fn with_filepath(mut self, filepath: Option<String>) -> Self {
        self.filepath = filepath;
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_memorized(mut self, memorized: impl Into<String>) -> Self {
        self.memorized = Some(memorized.into());
        self
    }
}

/// 进度接收端：无界通道发送半部
pub type ProgressSender = mpsc::UnboundedSender<ProgressUpdate>;

/// 尽力发送：无接收端或通道关闭时丢弃
pub fn send_progress(tx: &Option<ProgressSender>, update: ProgressUpdate) {
    if let Some(t) = tx {
        let _ = t.send(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let update = ProgressUpdate::new("success", "done", "write_code", "task-1", "u-1")
            .with_filepath(Some("a/b.txt".to_string()));
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["filepath"], "a/b.txt");
        assert!(json.get("url").is_none());
        assert!(json.get("comments").is_none());
    }

    #[tokio::test]
    async fn test_send_progress_best_effort() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        send_progress(
            &Some(tx),
            ProgressUpdate::new("running", "working", "browser", "t", "u"),
        );
        assert_eq!(rx.recv().await.unwrap().status, "running");

        // 无发送端时不报错
        send_progress(&None, ProgressUpdate::new("running", "x", "y", "t", "u"));
    }
}
