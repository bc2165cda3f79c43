// ==========================================
// 账单导入管道 - 导入 Trait
// ==========================================
// 职责: 定义导入管道各阶段接口（不包含实现）
// 流程: 解析 → 行转换 → 去重 → 分批写入 → 运行终态
// ==========================================

use crate::domain::import_run::ImportSummary;
use crate::domain::ledger::{CanonicalRecord, RawRow};
use crate::domain::types::ImportType;
use crate::importer::deduplicator::DedupOutcome;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ParsedSheet;
use crate::importer::progress::ProgressReporter;
use crate::importer::row_transformer::{TransformContext, TransformOutcome};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ==========================================
// ImportParams - 单次导入的调用参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportParams {
    pub import_type: ImportType,
    pub marketplace_id: String,
    pub period_start: Option<NaiveDate>, // 记录日期兜底
    pub period_end: Option<NaiveDate>,
    pub source_file_name: Option<String>, // 仅审计
    pub source_lines: Vec<usize>,         // 每行的源文件行号；为空时按输入序号
}

impl ImportParams {
    pub fn new(import_type: ImportType, marketplace_id: impl Into<String>) -> Self {
        Self {
            import_type,
            marketplace_id: marketplace_id.into(),
            period_start: None,
            period_end: None,
            source_file_name: None,
            source_lines: Vec::new(),
        }
    }

    pub fn with_period(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.period_start = start;
        self.period_end = end;
        self
    }

    pub fn with_source_file(mut self, name: impl Into<String>) -> Self {
        self.source_file_name = Some(name.into());
        self
    }

    pub fn with_source_lines(mut self, lines: Vec<usize>) -> Self {
        self.source_lines = lines;
        self
    }
}

// ==========================================
// LedgerImporter Trait
// ==========================================
// 用途: 导入管道主接口
// 实现者: LedgerImporterImpl
#[async_trait]
pub trait LedgerImporter: Send + Sync {
    /// 执行一次导入运行
    ///
    /// # 参数
    /// - params: 导入类型 / 营销平台 / 账期 / 源文件名
    /// - rows: 原始行（逐行消费，不整体驻留）
    /// - progress: 进度接收方
    ///
    /// # 返回
    /// - Ok(ImportSummary): 运行结束（completed 或 failed）
    /// - Err(FatalSetup): 运行无法创建或存储不可达
    async fn run_import<I>(
        &self,
        params: ImportParams,
        rows: I,
        progress: &dyn ProgressReporter,
    ) -> ImportResult<ImportSummary>
    where
        I: IntoIterator<Item = RawRow> + Send,
        I::IntoIter: ExactSizeIterator + Send;
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser, ExcelParser, UniversalFileParser
pub trait FileParser: Send + Sync {
    /// 解析文件为表头 + 按列序的行
    fn parse(&self, file_path: &Path) -> ImportResult<ParsedSheet>;
}

// ==========================================
// RowTransformer Trait
// ==========================================
// 实现者: LedgerRowTransformer
pub trait RowTransformer: Send + Sync {
    /// 单行转换；必填字段为空 → RowValidation
    fn transform(
        &self,
        ctx: &TransformContext,
        row_index: usize,
        row: &RawRow,
    ) -> ImportResult<TransformOutcome>;
}

// ==========================================
// Deduplicator Trait
// ==========================================
// 实现者: KeyDeduplicator
pub trait Deduplicator: Send + Sync {
    /// 同冲突键折叠（last-wins）
    fn dedup(&self, records: Vec<CanonicalRecord>) -> DedupOutcome;
}
