// ==========================================
// 账单导入管道 - 导入模块错误类型
// ==========================================
// 分类:
// - RowValidation: 行被排除，运行继续
// - BatchCommit: 整批失败，运行继续
// - TransientOverload: 退避后重试一次
// - FatalSetup: 整个运行中止并标记 failed
// 工具: thiserror 派生宏
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件不存在: {0}")]
    FileNotFound(String),

    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("Excel 解析失败: {0}")]
    ExcelParseError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    // ===== 行级错误（计入失败，不中断）=====
    #[error("行 {row}: 必填字段为空: {field}")]
    RowValidation { row: usize, field: String },

    // ===== 批次级错误（整批计入失败，不中断）=====
    #[error("批次 {batch_no} 写入失败 ({rows} 行): {message}")]
    BatchCommit {
        batch_no: usize,
        rows: usize,
        message: String,
    },

    #[error("存储过载: {0}")]
    TransientOverload(String),

    // ===== 致命错误（中断运行）=====
    #[error("导入初始化失败: {0}")]
    FatalSetup(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ===== 通用错误 =====
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 存储层错误：过载单独归类，其余视为致命
impl From<RepositoryError> for ImportError {
    fn from(err: RepositoryError) -> Self {
        match err {
            e if e.is_transient() => ImportError::TransientOverload(e.to_string()),
            e => ImportError::FatalSetup(e.to_string()),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
