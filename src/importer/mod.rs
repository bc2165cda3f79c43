// ==========================================
// 账单导入管道 - 导入层
// ==========================================
// 职责: 外部账单文件 → 规范化记录 → 幂等落库
// 支持: Excel, CSV
// ==========================================

// 模块声明
pub mod batch_committer;
pub mod deduplicator;
pub mod error;
pub mod field_table;
pub mod file_parser;
pub mod header_normalizer;
pub mod ledger_importer_impl;
pub mod ledger_importer_trait;
pub mod progress;
pub mod row_transformer;
pub mod run_tracker;
pub mod value_coercion;

// 重导出核心类型
pub use batch_committer::BatchCommitter;
pub use deduplicator::{DedupOutcome, KeyDeduplicator};
pub use error::{ImportError, ImportResult};
pub use field_table::{field_spec, field_table, to_raw_row, CoercionKind, FieldSpec, TypedValue};
pub use file_parser::{CsvParser, ExcelParser, ParsedSheet, UniversalFileParser};
pub use header_normalizer::{diagnose_headers, normalize_header, template_columns, HeaderReport};
pub use ledger_importer_impl::LedgerImporterImpl;
pub use progress::{
    ChannelProgress, NoopProgress, ProgressPhase, ProgressReporter, ProgressTracker,
    ProgressUpdate, TracingProgress,
};
pub use row_transformer::{LedgerRowTransformer, TransformContext, TransformOutcome};
pub use run_tracker::ImportRunTracker;

// 重导出 Trait 接口
pub use ledger_importer_trait::{
    Deduplicator, FileParser, ImportParams, LedgerImporter, RowTransformer,
};
