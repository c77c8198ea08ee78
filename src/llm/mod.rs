//! 外部能力层：思考 / 反思抽象与 Mock 实现

pub mod mock;
pub mod traits;

pub use mock::{MockReflection, MockThinking};
pub use traits::{LlmConfig, Reflection, ReflectionStatus, ReflectionVerdict, Thinking};
