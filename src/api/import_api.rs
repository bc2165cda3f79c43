// ==========================================
// 账单导入管道 - 导入API
// ==========================================
// 职责: 文件导入入口（解析 → 表头诊断 → 导入管道）与导入历史查询
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::{configure_sqlite_connection, init_schema};
use crate::domain::import_run::{ImportRun, ImportSummary};
use crate::domain::types::ImportType;
use crate::importer::header_normalizer::{diagnose_headers, HeaderReport};
use crate::importer::{
    FileParser, ImportParams, LedgerImporter, LedgerImporterImpl, ProgressReporter,
    UniversalFileParser,
};
use crate::repository::{ImportRunRepository, ImportRunRepositoryImpl, LedgerRepositoryImpl};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// 文件导入请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub import_type: ImportType,
    pub marketplace_id: String,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    /// 表头必须与模板列数、顺序完全一致
    #[serde(default)]
    pub strict_headers: bool,
}

/// 文件导入响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportFileResponse {
    pub summary: ImportSummary,
    pub headers: HeaderReport,
}

/// 导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
}

impl ImportApi {
    /// 打开数据库并初始化 schema
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = Connection::open(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// 使用已有连接（测试用内存库）
    pub fn from_connection(conn: Connection) -> ApiResult<Self> {
        configure_sqlite_connection(&conn)
            .and_then(|_| init_schema(&conn))
            .map_err(|e| ApiError::DatabaseError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn create_importer(
        &self,
    ) -> LedgerImporterImpl<LedgerRepositoryImpl, ImportRunRepositoryImpl, ConfigManager> {
        LedgerImporterImpl::new(
            LedgerRepositoryImpl::from_connection(self.conn.clone()),
            ImportRunRepositoryImpl::from_connection(self.conn.clone()),
            ConfigManager::from_connection(self.conn.clone()),
        )
    }

    fn run_repo(&self) -> ImportRunRepositoryImpl {
        ImportRunRepositoryImpl::from_connection(self.conn.clone())
    }

    /// 导入账单文件
    ///
    /// # 参数
    /// - file_path: .xlsx / .xls / .csv 文件路径
    /// - request: 导入类型、营销平台、账期、表头校验模式
    /// - progress: 进度接收方
    ///
    /// # 返回
    /// - Ok(ImportFileResponse): 运行结束（completed 或 failed）及表头诊断
    /// - Err(ApiError): 参数错误、文件无法解析、表头不符（严格模式）、初始化失败
    pub async fn import_file(
        &self,
        file_path: &Path,
        request: ImportRequest,
        progress: &dyn ProgressReporter,
    ) -> ApiResult<ImportFileResponse> {
        validate_request(&request)?;

        let sheet = UniversalFileParser.parse(file_path)?;
        let headers = diagnose_headers(request.import_type, &sheet.headers);
        info!(
            file = %file_path.display(),
            rows = sheet.row_count(),
            missing = headers.missing.len(),
            unexpected = headers.unexpected.len(),
            "文件解析完成"
        );

        if request.strict_headers && !headers.exact_match {
            let detail = match headers.warnings() {
                w if w.is_empty() => "列数或顺序不一致".to_string(),
                w => w.join("; "),
            };
            return Err(ApiError::TemplateMismatch(detail));
        }
        for w in headers.warnings() {
            warn!(warning = %w, "表头诊断");
        }

        let mut params = ImportParams::new(request.import_type, request.marketplace_id.clone())
            .with_period(request.period_start, request.period_end)
            .with_source_lines(sheet.lines.clone());
        if let Some(name) = file_path.file_name().and_then(|n| n.to_str()) {
            params = params.with_source_file(name);
        }

        let importer = self.create_importer();
        let mut summary = importer
            .run_import(params, sheet.into_raw_rows(request.import_type), progress)
            .await?;

        let mut warnings = headers.warnings();
        warnings.append(&mut summary.warnings);
        summary.warnings = warnings;

        Ok(ImportFileResponse { summary, headers })
    }

    /// 最近的导入运行（按创建时间倒序）
    pub async fn recent_runs(&self, limit: usize) -> ApiResult<Vec<ImportRun>> {
        Ok(self.run_repo().list_recent_runs(limit).await?)
    }

    /// 查询单次导入运行
    pub async fn get_run(&self, run_id: &str) -> ApiResult<ImportRun> {
        self.run_repo()
            .get_run(run_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("ImportRun(id={})不存在", run_id)))
    }
}

fn validate_request(request: &ImportRequest) -> ApiResult<()> {
    if request.marketplace_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("marketplace_id 不能为空".to_string()));
    }
    if let (Some(start), Some(end)) = (request.period_start, request.period_end) {
        if start > end {
            return Err(ApiError::InvalidInput(format!(
                "账期开始 {} 晚于结束 {}",
                start, end
            )));
        }
    }
    Ok(())
}
