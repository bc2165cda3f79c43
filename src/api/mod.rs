// ==========================================
// 账单导入管道 - API 层
// ==========================================
// 职责: 提供导入业务接口,供命令行/上层服务调用
// ==========================================

pub mod error;
pub mod import_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, ImportFileResponse, ImportRequest};
