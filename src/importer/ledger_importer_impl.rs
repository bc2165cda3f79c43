// ==========================================
// 账单导入管道 - 导入器实现
// ==========================================
// 职责: 编排一次导入运行，从原始行到落库
// 流程: 创建运行 → 逐行转换 → 去重 → 分批 upsert → 终态
// 红线: 行级/批次级错误只计数不中断；初始化失败直接返回
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import_run::ImportSummary;
use crate::domain::ledger::RawRow;
use crate::importer::batch_committer::BatchCommitter;
use crate::importer::deduplicator::KeyDeduplicator;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::ledger_importer_trait::{
    Deduplicator, ImportParams, LedgerImporter, RowTransformer,
};
use crate::importer::progress::{ProgressReporter, ProgressTracker};
use crate::importer::row_transformer::{LedgerRowTransformer, TransformContext};
use crate::importer::run_tracker::ImportRunTracker;
use crate::repository::{ImportRunRepository, LedgerRepository};
use async_trait::async_trait;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

// ==========================================
// LedgerImporterImpl - 账单导入器实现
// ==========================================
pub struct LedgerImporterImpl<L, R, C>
where
    L: LedgerRepository,
    R: ImportRunRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    ledger_repo: L,
    run_repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    transformer: Box<dyn RowTransformer>,
    deduplicator: Box<dyn Deduplicator>,
}

impl<L, R, C> LedgerImporterImpl<L, R, C>
where
    L: LedgerRepository,
    R: ImportRunRepository,
    C: ImportConfigReader,
{
    /// 使用默认转换器与去重器创建导入器
    pub fn new(ledger_repo: L, run_repo: R, config: C) -> Self {
        Self::with_components(
            ledger_repo,
            run_repo,
            config,
            Box::new(LedgerRowTransformer::new()),
            Box::new(KeyDeduplicator),
        )
    }

    pub fn with_components(
        ledger_repo: L,
        run_repo: R,
        config: C,
        transformer: Box<dyn RowTransformer>,
        deduplicator: Box<dyn Deduplicator>,
    ) -> Self {
        Self {
            ledger_repo,
            run_repo,
            config,
            transformer,
            deduplicator,
        }
    }

    pub fn run_repo(&self) -> &R {
        &self.run_repo
    }

    pub fn ledger_repo(&self) -> &L {
        &self.ledger_repo
    }
}

#[async_trait]
impl<L, R, C> LedgerImporter for LedgerImporterImpl<L, R, C>
where
    L: LedgerRepository,
    R: ImportRunRepository,
    C: ImportConfigReader,
{
    #[instrument(
        skip(self, params, rows, progress),
        fields(
            import_type = %params.import_type,
            marketplace_id = %params.marketplace_id,
            run_id
        )
    )]
    async fn run_import<I>(
        &self,
        params: ImportParams,
        rows: I,
        progress: &dyn ProgressReporter,
    ) -> ImportResult<ImportSummary>
    where
        I: IntoIterator<Item = RawRow> + Send,
        I::IntoIter: ExactSizeIterator + Send,
    {
        let start_time = Instant::now();

        let config = self
            .config
            .load_import_config()
            .await
            .map_err(|e| ImportError::FatalSetup(format!("读取导入配置失败: {}", e)))?;

        // === 步骤 1: 创建运行并进入 processing ===
        let mut tracker = ImportRunTracker::start(&self.run_repo, &params, &config).await?;
        let run_id = tracker.run_id().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        if let Err(e) = tracker.begin_processing().await {
            let fatal = ImportError::FatalSetup(format!("无法进入处理状态: {}", e));
            error!(error = %fatal, "导入初始化失败");
            tracker.abort(&fatal).await;
            return Err(fatal);
        }

        let mut progress = ProgressTracker::new(progress);
        let rows = rows.into_iter();
        let total_rows = rows.len();
        info!(total_rows = total_rows, "开始导入");

        // === 步骤 2: 逐行转换 ===
        let ctx = TransformContext {
            import_type: params.import_type,
            marketplace_id: params.marketplace_id.clone(),
            run_id: run_id.clone(),
            period_start: params.period_start,
        };

        let mut records = Vec::with_capacity(total_rows);
        let mut warnings: Vec<String> = Vec::new();
        let mut fallback_key_count = 0;

        for (idx, row) in rows.enumerate() {
            let position = idx + 1;
            let row_index = params.source_lines.get(idx).copied().unwrap_or(position);
            match self.transformer.transform(&ctx, row_index, &row) {
                Ok(outcome) => {
                    if outcome.used_fallback_key {
                        fallback_key_count += 1;
                    }
                    for w in outcome.warnings {
                        if warnings.len() < config.max_reported_errors {
                            warnings.push(w);
                        }
                    }
                    records.push(outcome.record);
                }
                Err(e) => {
                    debug!(row = row_index, error = %e, "行转换失败");
                    tracker.record_row_error(&e);
                }
            }

            if position % config.progress_chunk_rows == 0 {
                progress.transform(position, total_rows);
                tokio::task::yield_now().await;
            }
        }
        progress.transform(total_rows, total_rows);

        info!(
            transformed = records.len(),
            failed = tracker.failed(),
            fallback_keys = fallback_key_count,
            "行转换完成"
        );
        if fallback_key_count > 0 {
            warn!(count = fallback_key_count, "部分行缺少商品编码，已使用兜底键");
        }

        // === 步骤 3: 去重 ===
        let deduped = self.deduplicator.dedup(records);
        tracker.record_deduplicated(deduped.dropped_count());
        if deduped.dropped_count() > 0 {
            info!(dropped = deduped.dropped_count(), "同键记录已折叠");
        }

        // === 步骤 4: 分批写入 ===
        let committer = BatchCommitter::new(
            &self.ledger_repo,
            params.import_type,
            config.overload_backoff(),
        );
        let total_batches = deduped.records.len().div_ceil(config.batch_size);

        for (idx, batch) in deduped.records.chunks(config.batch_size).enumerate() {
            let result = committer.commit(idx + 1, batch).await;
            tracker.record_batch(&result);
            progress.commit(idx + 1, total_batches);
            tokio::task::yield_now().await;
        }

        // === 步骤 5: 终态 ===
        let status = match tracker.finalize().await {
            Ok(status) => status,
            Err(e) => {
                error!(error = %e, "导入运行终态写入失败");
                tracker.abort(&e).await;
                return Err(e);
            }
        };
        progress.finish(total_rows, total_rows);

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        info!(
            status = %status,
            imported = tracker.imported(),
            failed = tracker.failed(),
            batches = total_batches,
            elapsed_ms = elapsed_ms,
            "导入完成"
        );

        Ok(ImportSummary {
            run_id,
            import_type: params.import_type,
            status,
            total_rows,
            success_count: tracker.imported(),
            failed_count: tracker.failed(),
            deduplicated_count: tracker.deduplicated(),
            fallback_key_count,
            commit_batches: total_batches,
            errors: tracker.errors(config.max_reported_errors),
            warnings,
            elapsed_ms,
        })
    }
}
