//! 调度层：沙箱 HTTP 客户端与动作调度器

pub mod dispatcher;
pub mod sandbox;

pub use dispatcher::ActionDispatcher;
pub use sandbox::{BrowserHistory, SandboxClient};
