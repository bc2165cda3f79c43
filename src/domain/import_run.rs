// ==========================================
// 账单导入管道 - 导入运行领域模型
// ==========================================
// 职责: 导入运行审计记录 / 批次结果 / 运行汇总
// 对齐: import_runs 表
// ==========================================

use crate::domain::types::{ImportType, RunStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// ImportRun - 导入运行
// ==========================================
// 红线: 只由导入管道修改；终态后不可再变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRun {
    pub id: String,                         // 运行 ID（UUID）
    pub marketplace_id: String,             // 所属营销平台
    pub import_type: ImportType,            // 导入类型
    pub source_file_name: Option<String>,   // 源文件名（仅审计）
    pub period_start: Option<NaiveDate>,    // 账期开始（日期兜底）
    pub period_end: Option<NaiveDate>,      // 账期结束
    pub status: RunStatus,                  // 运行状态
    pub records_imported: i64,              // 成功写入行数
    pub records_failed: i64,                // 失败行数
    pub records_deduplicated: i64,          // 同键折叠丢弃行数
    pub error_message: Option<String>,      // 前 N 条错误（截断）
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportRun {
    /// 创建 pending 状态的新运行
    pub fn new_pending(
        marketplace_id: impl Into<String>,
        import_type: ImportType,
        source_file_name: Option<String>,
        period_start: Option<NaiveDate>,
        period_end: Option<NaiveDate>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            marketplace_id: marketplace_id.into(),
            import_type,
            source_file_name,
            period_start,
            period_end,
            status: RunStatus::Pending,
            records_imported: 0,
            records_failed: 0,
            records_deduplicated: 0,
            error_message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

// ==========================================
// RunTally - 运行终态统计
// ==========================================
// 用途: 终态转换时一次性落库
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunTally {
    pub records_imported: i64,
    pub records_failed: i64,
    pub records_deduplicated: i64,
    pub error_message: Option<String>,
}

// ==========================================
// BatchResult - 单批次写入结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub batch_no: usize,    // 批次序号（从 1 开始）
    pub attempted: usize,   // 尝试写入行数
    pub succeeded: usize,   // 成功行数
    pub failed: usize,      // 失败行数
    pub retried: bool,      // 是否因过载重试
    pub errors: Vec<String>,
}

// ==========================================
// ImportSummary - 导入结果（返回调用方）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub run_id: String,
    pub import_type: ImportType,
    pub status: RunStatus,
    pub total_rows: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub deduplicated_count: usize,
    pub fallback_key_count: usize, // 使用 SERVICE_ 兜底键的行数
    pub commit_batches: usize,
    pub errors: Vec<String>,       // 前 N 条错误
    pub warnings: Vec<String>,     // 表头诊断等提示
    pub elapsed_ms: u64,
}
