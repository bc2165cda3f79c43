// ==========================================
// 账单导入管道 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod import_run_repo;
pub mod import_run_repo_impl;
pub mod ledger_repo;
pub mod ledger_repo_impl;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use import_run_repo::ImportRunRepository;
pub use import_run_repo_impl::ImportRunRepositoryImpl;
pub use ledger_repo::LedgerRepository;
pub use ledger_repo_impl::LedgerRepositoryImpl;
