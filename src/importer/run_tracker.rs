// ==========================================
// 账单导入管道 - 导入运行跟踪器
// ==========================================
// 职责: 运行记录的创建 / 状态转换 / 统计累计 / 终态落库
// 状态机: pending → processing → {completed, failed}
// 红线: 终态之后不再写入
// ==========================================

use crate::config::ImportConfig;
use crate::domain::import_run::{BatchResult, ImportRun, RunTally};
use crate::domain::types::RunStatus;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::ledger_importer_trait::ImportParams;
use crate::repository::ImportRunRepository;
use tracing::{info, warn};

pub struct ImportRunTracker<'a, R: ImportRunRepository + ?Sized> {
    repo: &'a R,
    run: ImportRun,
    imported: usize,
    failed: usize,
    deduplicated: usize,
    errors: Vec<String>,
    error_cap: usize,
    persisted_error_count: usize,
    error_message_max_chars: usize,
}

impl<'a, R: ImportRunRepository + ?Sized> ImportRunTracker<'a, R> {
    /// 创建 pending 运行并落库；失败视为初始化失败
    pub async fn start(
        repo: &'a R,
        params: &ImportParams,
        config: &ImportConfig,
    ) -> ImportResult<ImportRunTracker<'a, R>> {
        let run = ImportRun::new_pending(
            params.marketplace_id.clone(),
            params.import_type,
            params.source_file_name.clone(),
            params.period_start,
            params.period_end,
        );
        repo.create_run(&run)
            .await
            .map_err(|e| ImportError::FatalSetup(format!("创建导入运行失败: {}", e)))?;

        info!(run_id = %run.id, import_type = %run.import_type, "导入运行已创建");

        Ok(Self {
            repo,
            run,
            imported: 0,
            failed: 0,
            deduplicated: 0,
            errors: Vec::new(),
            error_cap: config.max_reported_errors.max(config.persisted_error_count),
            persisted_error_count: config.persisted_error_count,
            error_message_max_chars: config.error_message_max_chars,
        })
    }

    pub fn run(&self) -> &ImportRun {
        &self.run
    }

    pub fn run_id(&self) -> &str {
        &self.run.id
    }

    /// pending → processing
    pub async fn begin_processing(&mut self) -> ImportResult<()> {
        self.check_transition(RunStatus::Processing)?;
        self.repo
            .update_status(&self.run.id, RunStatus::Processing)
            .await?;
        self.run.status = RunStatus::Processing;
        Ok(())
    }

    /// 记录一条行级错误
    pub fn record_row_error(&mut self, error: &ImportError) {
        self.failed += 1;
        self.push_error(error.to_string());
    }

    /// 累计批次结果
    pub fn record_batch(&mut self, batch: &BatchResult) {
        self.imported += batch.succeeded;
        self.failed += batch.failed;
        for message in &batch.errors {
            self.push_error(message.clone());
        }
    }

    pub fn record_deduplicated(&mut self, count: usize) {
        self.deduplicated += count;
    }

    pub fn imported(&self) -> usize {
        self.imported
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn deduplicated(&self) -> usize {
        self.deduplicated
    }

    /// 最多 limit 条错误信息
    pub fn errors(&self, limit: usize) -> Vec<String> {
        self.errors.iter().take(limit).cloned().collect()
    }

    /// 有失败且无任何成功 → failed；否则 completed
    pub fn terminal_status(&self) -> RunStatus {
        if self.failed > 0 && self.imported == 0 {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    /// 写入终态与统计
    pub async fn finalize(&mut self) -> ImportResult<RunStatus> {
        let status = self.terminal_status();
        self.check_transition(status)?;

        let tally = RunTally {
            records_imported: self.imported as i64,
            records_failed: self.failed as i64,
            records_deduplicated: self.deduplicated as i64,
            error_message: self.error_message(),
        };
        self.repo.finalize_run(&self.run.id, status, &tally).await?;

        self.run.status = status;
        self.run.records_imported = tally.records_imported;
        self.run.records_failed = tally.records_failed;
        self.run.records_deduplicated = tally.records_deduplicated;
        self.run.error_message = tally.error_message;

        info!(
            run_id = %self.run.id,
            status = %status,
            imported = self.imported,
            failed = self.failed,
            deduplicated = self.deduplicated,
            "导入运行结束"
        );
        Ok(status)
    }

    /// 致命错误：尽力将运行标记为 failed（本身失败只记日志）
    pub async fn abort(&mut self, reason: &ImportError) {
        if self.run.status.is_terminal() {
            return;
        }
        self.push_error(reason.to_string());
        let tally = RunTally {
            records_imported: self.imported as i64,
            records_failed: self.failed as i64,
            records_deduplicated: self.deduplicated as i64,
            error_message: self.error_message(),
        };
        match self
            .repo
            .finalize_run(&self.run.id, RunStatus::Failed, &tally)
            .await
        {
            Ok(()) => {
                self.run.status = RunStatus::Failed;
                self.run.error_message = tally.error_message;
            }
            Err(e) => {
                warn!(run_id = %self.run.id, error = %e, "无法将导入运行标记为失败");
            }
        }
    }

    /// 前 persisted_error_count 条错误，换行拼接后按字符截断
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        let joined = self
            .errors
            .iter()
            .take(self.persisted_error_count)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        Some(joined.chars().take(self.error_message_max_chars).collect())
    }

    fn push_error(&mut self, message: String) {
        if self.errors.len() < self.error_cap {
            self.errors.push(message);
        }
    }

    fn check_transition(&self, next: RunStatus) -> ImportResult<()> {
        if self.run.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(ImportError::InvalidStateTransition {
                from: self.run.status.to_string(),
                to: next.to_string(),
            })
        }
    }
}
