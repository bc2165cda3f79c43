// ==========================================
// 账单导入管道 - 导入运行 Repository Trait
// ==========================================
// 职责: import_runs 表的读写接口（不包含实现）
// 红线: 状态转换规则由 ImportRunTracker 把关，这里只做 CRUD
// ==========================================

use crate::domain::import_run::{ImportRun, RunTally};
use crate::domain::types::RunStatus;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ImportRunRepository Trait
// ==========================================
// 实现者: ImportRunRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ImportRunRepository: Send + Sync {
    /// 新建运行记录
    async fn create_run(&self, run: &ImportRun) -> RepositoryResult<()>;

    /// 更新运行状态（非终态）
    ///
    /// # 返回
    /// - Err(NotFound): 运行不存在
    async fn update_status(&self, run_id: &str, status: RunStatus) -> RepositoryResult<()>;

    /// 写入终态及统计，同时记录 completed_at
    async fn finalize_run(
        &self,
        run_id: &str,
        status: RunStatus,
        tally: &RunTally,
    ) -> RepositoryResult<()>;

    /// 按 ID 查询
    async fn get_run(&self, run_id: &str) -> RepositoryResult<Option<ImportRun>>;

    /// 最近的运行（按创建时间倒序）
    async fn list_recent_runs(&self, limit: usize) -> RepositoryResult<Vec<ImportRun>>;
}
