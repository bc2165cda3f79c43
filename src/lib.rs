// ==========================================
// 营销平台账单导入管道 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 应计账单 / 仓储费用报表的批量导入
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 导入参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{ImportType, RunStatus};

// 领域实体
pub use domain::{
    BatchResult, CanonicalRecord, CellValue, ImportRun, ImportSummary, RawRow, RunTally,
};

// 导入管道
pub use importer::{
    ImportError, ImportParams, ImportResult, LedgerImporter, LedgerImporterImpl,
    ProgressReporter, ProgressUpdate,
};

// API
pub use api::{ApiError, ImportApi, ImportRequest};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "营销平台账单导入";
