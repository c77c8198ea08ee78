//! 本地工具：注册表与 write_code / read_file 处理器

pub mod read_file;
pub mod registry;
pub mod write_code;

pub use read_file::ReadFileHandler;
pub use registry::{Tool, ToolOutput, ToolRegistry};
pub use write_code::WriteCodeHandler;
