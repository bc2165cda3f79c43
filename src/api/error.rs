// ==========================================
// 账单导入管道 - API层错误类型
// ==========================================
// 职责: 将导入层/仓储层错误转换为调用方可读的错误消息
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("表头与模板不符: {0}")]
    TemplateMismatch(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("存储繁忙，请稍后重试: {0}")]
    StorageBusy(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("导入初始化失败: {0}")]
    SetupFailed(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::StorageBusy(msg) => ApiError::StorageBusy(msg),
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
            other => ApiError::DatabaseError(other.to_string()),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::FileNotFound(path) => ApiError::NotFound(format!("文件 {}", path)),
            ImportError::UnsupportedFormat(_) => ApiError::InvalidInput(err.to_string()),
            ImportError::FatalSetup(msg) => ApiError::SetupFailed(msg),
            ImportError::TransientOverload(msg) => ApiError::StorageBusy(msg),
            ImportError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            ImportError::Other(err) => ApiError::Other(err),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_error_mapping() {
        let api: ApiError = ImportError::FatalSetup("db down".to_string()).into();
        assert!(matches!(api, ApiError::SetupFailed(_)));

        let api: ApiError = ImportError::CsvParseError("bad quote".to_string()).into();
        assert_eq!(api.to_string(), "文件导入失败: CSV 解析失败: bad quote");

        let api: ApiError = ImportError::InvalidStateTransition {
            from: "completed".to_string(),
            to: "processing".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_repository_error_mapping() {
        let api: ApiError = RepositoryError::NotFound {
            entity: "ImportRun".to_string(),
            id: "r1".to_string(),
        }
        .into();
        assert_eq!(api.to_string(), "资源未找到: ImportRun(id=r1)不存在");

        let api: ApiError = RepositoryError::StorageBusy("locked".to_string()).into();
        assert!(matches!(api, ApiError::StorageBusy(_)));
    }
}
