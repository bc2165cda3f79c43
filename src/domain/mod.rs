// ==========================================
// 账单导入管道 - 领域模型层
// ==========================================
// 职责: 定义导入运行、原始行、规范化记录等实体
// 红线: 不含数据访问逻辑,不含导入流程逻辑
// ==========================================

pub mod import_run;
pub mod ledger;
pub mod types;

// 重导出核心类型
pub use import_run::{BatchResult, ImportRun, ImportSummary, RunTally};
pub use ledger::{
    AccrualRecord, CanonicalRecord, CellValue, DedupKey, LedgerField, RawRow, StorageCostRecord,
};
pub use types::{ImportType, RunStatus};
