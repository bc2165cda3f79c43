// ==========================================
// 账单导入管道 - 批次写入器
// ==========================================
// 职责: 按批调用幂等 upsert；存储过载时退避后重试一次
// 红线: 单批失败只影响本批，不中断后续批次
// ==========================================

use crate::domain::import_run::BatchResult;
use crate::domain::ledger::CanonicalRecord;
use crate::domain::types::ImportType;
use crate::importer::error::ImportError;
use crate::repository::{LedgerRepository, RepositoryError};
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct BatchCommitter<'a, R: LedgerRepository + ?Sized> {
    repo: &'a R,
    import_type: ImportType,
    backoff: Duration,
}

impl<'a, R: LedgerRepository + ?Sized> BatchCommitter<'a, R> {
    pub fn new(repo: &'a R, import_type: ImportType, backoff: Duration) -> Self {
        Self {
            repo,
            import_type,
            backoff,
        }
    }

    /// 写入一批（batch_no 从 1 开始）
    ///
    /// # 返回
    /// 批次结果；写入失败时整批计为失败并附带一条错误
    pub async fn commit(&self, batch_no: usize, records: &[CanonicalRecord]) -> BatchResult {
        let attempted = records.len();
        let mut result = BatchResult {
            batch_no,
            attempted,
            ..Default::default()
        };

        let outcome = match self.repo.upsert_batch(self.import_type, records).await {
            Err(e) if e.is_transient() => {
                warn!(
                    batch_no = batch_no,
                    rows = attempted,
                    backoff_ms = self.backoff.as_millis() as u64,
                    error = %e,
                    "存储过载，退避后重试"
                );
                result.retried = true;
                tokio::time::sleep(self.backoff).await;
                self.repo.upsert_batch(self.import_type, records).await
            }
            other => other,
        };

        match outcome {
            Ok(written) => {
                debug!(batch_no = batch_no, written = written, "批次写入完成");
                result.succeeded = attempted;
            }
            Err(e) => {
                let err = self.batch_error(batch_no, attempted, e);
                error!(batch_no = batch_no, rows = attempted, error = %err, "批次写入失败");
                result.failed = attempted;
                result.errors.push(err.to_string());
            }
        }

        result
    }

    fn batch_error(&self, batch_no: usize, rows: usize, e: RepositoryError) -> ImportError {
        let message = if e.is_transient() {
            ImportError::TransientOverload(e.to_string()).to_string()
        } else {
            e.to_string()
        };
        ImportError::BatchCommit {
            batch_no,
            rows,
            message,
        }
    }
}
