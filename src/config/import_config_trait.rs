// ==========================================
// 账单导入管道 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入管道所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

// ==========================================
// ImportConfig - 导入参数快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// 每批 upsert 行数
    pub batch_size: usize,
    /// 转换阶段每 N 行让出一次并汇报进度
    pub progress_chunk_rows: usize,
    /// 过载后退避时长（毫秒）
    pub overload_backoff_ms: u64,
    /// 返回调用方的错误条数上限
    pub max_reported_errors: usize,
    /// 写入 import_runs.error_message 的错误条数
    pub persisted_error_count: usize,
    /// error_message 最大字符数
    pub error_message_max_chars: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            progress_chunk_rows: 5000,
            overload_backoff_ms: 2000,
            max_reported_errors: 100,
            persisted_error_count: 5,
            error_message_max_chars: 2000,
        }
    }
}

impl ImportConfig {
    /// 规范化：批大小与进度步长至少为 1
    pub fn normalized(mut self) -> Self {
        self.batch_size = self.batch_size.max(1);
        self.progress_chunk_rows = self.progress_chunk_rows.max(1);
        self
    }

    pub fn overload_backoff(&self) -> Duration {
        Duration::from_millis(self.overload_backoff_ms)
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取每批 upsert 行数
    ///
    /// # 默认值
    /// - 1000
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取进度汇报步长（行）
    ///
    /// # 默认值
    /// - 5000
    async fn get_progress_chunk_rows(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取过载退避时长（毫秒）
    ///
    /// # 默认值
    /// - 2000
    async fn get_overload_backoff_ms(&self) -> Result<u64, Box<dyn Error + Send + Sync>>;

    /// 获取返回调用方的错误条数上限
    ///
    /// # 默认值
    /// - 100
    async fn get_max_reported_errors(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取落库的错误条数
    ///
    /// # 默认值
    /// - 5
    async fn get_persisted_error_count(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 获取 error_message 最大字符数
    ///
    /// # 默认值
    /// - 2000
    async fn get_error_message_max_chars(&self) -> Result<usize, Box<dyn Error + Send + Sync>>;

    /// 一次性读取全部导入参数
    async fn load_import_config(&self) -> Result<ImportConfig, Box<dyn Error + Send + Sync>> {
        Ok(ImportConfig {
            batch_size: self.get_batch_size().await?,
            progress_chunk_rows: self.get_progress_chunk_rows().await?,
            overload_backoff_ms: self.get_overload_backoff_ms().await?,
            max_reported_errors: self.get_max_reported_errors().await?,
            persisted_error_count: self.get_persisted_error_count().await?,
            error_message_max_chars: self.get_error_message_max_chars().await?,
        }
        .normalized())
    }
}

// 固定配置（测试与嵌入调用使用）
#[async_trait]
impl ImportConfigReader for ImportConfig {
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.batch_size)
    }

    async fn get_progress_chunk_rows(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.progress_chunk_rows)
    }

    async fn get_overload_backoff_ms(&self) -> Result<u64, Box<dyn Error + Send + Sync>> {
        Ok(self.overload_backoff_ms)
    }

    async fn get_max_reported_errors(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.max_reported_errors)
    }

    async fn get_persisted_error_count(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.persisted_error_count)
    }

    async fn get_error_message_max_chars(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        Ok(self.error_message_max_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps_zero() {
        let config = ImportConfig {
            batch_size: 0,
            progress_chunk_rows: 0,
            ..ImportConfig::default()
        }
        .normalized();
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.progress_chunk_rows, 1);
    }

    #[tokio::test]
    async fn test_fixed_config_reader() {
        let config = ImportConfig {
            batch_size: 250,
            ..ImportConfig::default()
        };
        let loaded = config.load_import_config().await.unwrap();
        assert_eq!(loaded.batch_size, 250);
        assert_eq!(loaded.overload_backoff(), Duration::from_millis(2000));
    }
}
