// ==========================================
// 账单导入管道 - 账单写入 Repository Trait
// ==========================================
// 职责: 定义账单记录的幂等写入接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据写入
// ==========================================

use crate::domain::ledger::CanonicalRecord;
use crate::domain::types::ImportType;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// LedgerRepository Trait
// ==========================================
// 用途: 批次级 upsert（冲突键 = 自然键）
// 实现者: LedgerRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// 在单个事务中写入一批记录（INSERT ... ON CONFLICT DO UPDATE）
    ///
    /// # 参数
    /// - import_type: 目标表
    /// - records: 同一导入类型的记录，冲突键互不相同
    ///
    /// # 返回
    /// - Ok(usize): 写入（插入或更新）的记录数
    /// - Err(DuplicateConflictKey): 批内存在同键记录，整批不写
    /// - Err(StorageBusy): 存储过载，可重试
    /// - Err: 其他数据库错误（整个事务回滚）
    async fn upsert_batch(
        &self,
        import_type: ImportType,
        records: &[CanonicalRecord],
    ) -> RepositoryResult<usize>;
}
