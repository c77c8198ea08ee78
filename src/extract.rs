//! 浏览器轨迹内容提取
//!
//! 把沙箱浏览器自动化返回的原始轨迹（逐步的 url + extracted_content）压成一条
//! 用户可读的最终回答。优先结构化 JSON（headlines / results 列表），否则取最后
//! 一条非空内容做标记清洗；清洗后仍然只是原问题的复读时回退为原问题。
//! 标记集合与判定次序是行为约定，勿依赖正则的偶然顺序调整。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 页面提取横幅（轨迹中结构化内容前的技术标记）
const EXTRACTED_MARKER: &str = "📄  Extracted from page";

/// 浏览器轨迹单步：访问的 url 与该步提取的页面内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserTraceEntry {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub extracted_content: String,
}

fn fenced_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.*?)\s*```").unwrap())
}

fn marker_json_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)📄\s*Extracted from page[:\s]*```json\s*(.*?)\s*```").unwrap()
    })
}

fn marker_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)📄\s*Extracted from page[:\s]*").unwrap())
}

fn fence_open_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```json\s*").unwrap())
}

fn fence_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"```\s*").unwrap())
}

fn new_tab_strip_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)🔗\s*Opened new tab with.*$").unwrap())
}

/// 从一条轨迹内容中取出待解析的 JSON 文本：
/// 围栏块优先，其次页面提取横幅后的围栏块，最后整条内容（裸 [ / { 情况）
fn candidate_json(content: &str) -> String {
    if content.contains("```json") {
        if let Some(caps) = fenced_json_re().captures(content) {
            return caps[1].to_string();
        }
    } else if content.contains(EXTRACTED_MARKER) {
        if let Some(caps) = marker_json_re().captures(content) {
            return caps[1].to_string();
        }
    }
    content.to_string()
}

/// 解析结构化内容：headlines 列表 -> 带标题的编号清单；results 列表 -> 计数 + 编号清单。
/// 首个命中的条目生效，后续不再扫描。
fn render_structured(parsed: &Value) -> Option<String> {
    if let Some(headlines) = parsed.get("headlines").and_then(Value::as_array) {
        let list = headlines
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}. {}", i + 1, h.as_str().map(String::from).unwrap_or_else(|| h.to_string())))
            .collect::<Vec<_>>()
            .join("\n");
        return Some(format!("Here are the current headlines:\n\n{}", list));
    }
    if let Some(results) = parsed.get("results").and_then(Value::as_array) {
        let list = results
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let text = match item.as_str() {
                    Some(s) => s.to_string(),
                    None => item.to_string(),
                };
                format!("{}. {}", i + 1, text)
            })
            .collect::<Vec<_>>()
            .join("\n");
        return Some(format!("Found {} results:\n\n{}", results.len(), list));
    }
    None
}

/// 清洗最终回答：去掉页面提取横幅、代码围栏与新标签页提示
fn strip_technical_markers(answer: &str) -> String {
    let cleaned = marker_strip_re().replace_all(answer, "");
    let cleaned = fence_open_strip_re().replace_all(&cleaned, "");
    let cleaned = fence_strip_re().replace_all(&cleaned, "");
    let cleaned = new_tab_strip_re().replace_all(&cleaned, "");
    cleaned.trim().to_string()
}

/// 从浏览器轨迹中提取最终回答；轨迹为空或提取退化时返回原问题
pub fn extract_answers_from_browser_history(
    history: &[BrowserTraceEntry],
    original_prompt: &str,
) -> String {
    let answers: Vec<&str> = history
        .iter()
        .map(|e| e.extracted_content.trim())
        .filter(|c| !c.is_empty())
        .collect();

    let Some(final_answer) = answers.last().copied() else {
        return original_prompt.to_string();
    };

    // 结构化内容优先：逐条尝试解析，首个产出即停止
    for content in &answers {
        let looks_structured = content.contains("```json")
            || content.contains("\"headlines\"")
            || content.contains('[')
            || content.contains('{');
        if !looks_structured {
            continue;
        }
        let json_str = candidate_json(content);
        let Ok(parsed) = serde_json::from_str::<Value>(&json_str) else {
            continue;
        };
        if let Some(structured) = render_structured(&parsed) {
            return structured;
        }
    }

    let clean_answer = strip_technical_markers(final_answer);

    // 清洗后仍基本是原问题的复读（且没有明显变长）视为退化提取
    if clean_answer
        .to_lowercase()
        .contains(&original_prompt.to_lowercase())
        && clean_answer.len() < original_prompt.len() * 2
    {
        return original_prompt.to_string();
    }

    if clean_answer.is_empty() {
        return original_prompt.to_string();
    }

    clean_answer
}
