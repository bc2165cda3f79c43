// ==========================================
// 账单导入管道 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::import_config_trait::{ImportConfig, ImportConfigReader};
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// 配置键
pub mod config_keys {
    pub const BATCH_SIZE: &str = "import/batch_size";
    pub const PROGRESS_CHUNK_ROWS: &str = "import/progress_chunk_rows";
    pub const OVERLOAD_BACKOFF_MS: &str = "import/overload_backoff_ms";
    pub const MAX_REPORTED_ERRORS: &str = "import/max_reported_errors";
    pub const PERSISTED_ERROR_COUNT: &str = "import/persisted_error_count";
    pub const ERROR_MESSAGE_MAX_CHARS: &str = "import/error_message_max_chars";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    defaults: ImportConfig,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            defaults: ImportConfig::default(),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            conn,
            defaults: ImportConfig::default(),
        }
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global scope 配置（存在则覆盖）
    pub fn set_global_config_value(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;

        Ok(())
    }

    /// 读取并解析配置，缺失或非法时回落默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> Result<T, Box<dyn Error + Send + Sync>>
    where
        T: FromStr + Copy,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key = key, value = %raw, "配置值非法，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_batch_size(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        self.get_parsed_or_default(config_keys::BATCH_SIZE, self.defaults.batch_size)
    }

    async fn get_progress_chunk_rows(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        self.get_parsed_or_default(
            config_keys::PROGRESS_CHUNK_ROWS,
            self.defaults.progress_chunk_rows,
        )
    }

    async fn get_overload_backoff_ms(&self) -> Result<u64, Box<dyn Error + Send + Sync>> {
        self.get_parsed_or_default(
            config_keys::OVERLOAD_BACKOFF_MS,
            self.defaults.overload_backoff_ms,
        )
    }

    async fn get_max_reported_errors(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        self.get_parsed_or_default(
            config_keys::MAX_REPORTED_ERRORS,
            self.defaults.max_reported_errors,
        )
    }

    async fn get_persisted_error_count(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        self.get_parsed_or_default(
            config_keys::PERSISTED_ERROR_COUNT,
            self.defaults.persisted_error_count,
        )
    }

    async fn get_error_message_max_chars(&self) -> Result<usize, Box<dyn Error + Send + Sync>> {
        self.get_parsed_or_default(
            config_keys::ERROR_MESSAGE_MAX_CHARS,
            self.defaults.error_message_max_chars,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn memory_manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let manager = memory_manager();
        let config = manager.load_import_config().await.unwrap();
        assert_eq!(config, ImportConfig::default());
    }

    #[tokio::test]
    async fn test_override_from_config_kv() {
        let manager = memory_manager();
        manager.set_global_config_value(config_keys::BATCH_SIZE, "500").unwrap();
        manager
            .set_global_config_value(config_keys::OVERLOAD_BACKOFF_MS, "10")
            .unwrap();

        let config = manager.load_import_config().await.unwrap();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.overload_backoff_ms, 10);
    }

    #[tokio::test]
    async fn test_invalid_value_falls_back() {
        let manager = memory_manager();
        manager.set_global_config_value(config_keys::BATCH_SIZE, "abc").unwrap();
        manager.set_global_config_value(config_keys::PROGRESS_CHUNK_ROWS, "0").unwrap();

        let config = manager.load_import_config().await.unwrap();
        assert_eq!(config.batch_size, 1000);
        // 0 经过规范化变为 1
        assert_eq!(config.progress_chunk_rows, 1);
    }
}
