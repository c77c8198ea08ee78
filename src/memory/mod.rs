//! 记忆层：按任务的追加式消息日志与持久化

pub mod local;

pub use local::{LocalMemory, MemoryEntry};
