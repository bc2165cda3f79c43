// ==========================================
// 账单导入管道 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout；超时后的 SQLITE_BUSY 视为存储过载
// - 建表语句幂等，可在每次启动时执行
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 默认数据库路径
///
/// 优先使用环境变量 MARKETPLACE_LEDGER_DB_PATH；否则放在用户数据目录下
pub fn default_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("MARKETPLACE_LEDGER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(trimmed);
        }
    }

    match dirs::data_dir() {
        Some(data_dir) => {
            let dir = data_dir.join("marketplace-ledger-import");
            // 目录创建失败时由 Connection::open 报告
            std::fs::create_dir_all(&dir).ok();
            dir.join("marketplace_ledger.db")
        }
        None => PathBuf::from("./marketplace_ledger.db"),
    }
}

/// 初始化 schema（幂等）
///
/// 冲突键即自然键：
/// - ozon_accruals: (marketplace_id, accrual_date, offer_id, accrual_type)
/// - storage_costs: (marketplace_id, cost_date, offer_id)
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS import_runs (
            id TEXT PRIMARY KEY,
            marketplace_id TEXT NOT NULL,
            import_type TEXT NOT NULL,
            source_file_name TEXT,
            period_start TEXT,
            period_end TEXT,
            status TEXT NOT NULL DEFAULT 'pending',
            records_imported INTEGER NOT NULL DEFAULT 0,
            records_failed INTEGER NOT NULL DEFAULT 0,
            records_deduplicated INTEGER NOT NULL DEFAULT 0,
            error_message TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_import_runs_created_at
            ON import_runs (created_at DESC);

        CREATE TABLE IF NOT EXISTS ozon_accruals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            marketplace_id TEXT NOT NULL,
            accrual_date TEXT NOT NULL,
            offer_id TEXT NOT NULL,
            accrual_type TEXT NOT NULL,
            accrual_type_raw TEXT,
            accrual_type_norm TEXT,
            posting_number_or_service_id TEXT,
            accepted_or_service_date TEXT,
            warehouse TEXT,
            sku TEXT,
            item_name TEXT,
            localization_index TEXT,
            quantity REAL NOT NULL DEFAULT 0,
            amount_before_fees REAL NOT NULL DEFAULT 0,
            ozon_fee_percent REAL NOT NULL DEFAULT 0,
            ozon_fee_amount REAL NOT NULL DEFAULT 0,
            order_assembly REAL NOT NULL DEFAULT 0,
            dropoff_pickup_processing REAL NOT NULL DEFAULT 0,
            main_route REAL NOT NULL DEFAULT 0,
            last_mile REAL NOT NULL DEFAULT 0,
            reverse_main_route REAL NOT NULL DEFAULT 0,
            return_processing REAL NOT NULL DEFAULT 0,
            canceled_or_unclaimed_processing REAL NOT NULL DEFAULT 0,
            unredeemed_processing REAL NOT NULL DEFAULT 0,
            logistics REAL NOT NULL DEFAULT 0,
            avg_delivery_hours REAL NOT NULL DEFAULT 0,
            reverse_logistics REAL NOT NULL DEFAULT 0,
            total_rub REAL NOT NULL DEFAULT 0,
            import_batch_id TEXT REFERENCES import_runs(id),
            imported_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (marketplace_id, accrual_date, offer_id, accrual_type)
        );

        CREATE TABLE IF NOT EXISTS storage_costs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            marketplace_id TEXT NOT NULL,
            cost_date TEXT NOT NULL,
            offer_id TEXT NOT NULL,
            sku TEXT,
            category TEXT,
            descriptive_type TEXT,
            warehouse TEXT,
            item_flag TEXT,
            total_volume_ml REAL NOT NULL DEFAULT 0,
            instances INTEGER NOT NULL DEFAULT 0,
            paid_volume_ml REAL NOT NULL DEFAULT 0,
            paid_instances INTEGER NOT NULL DEFAULT 0,
            storage_cost_amount REAL NOT NULL DEFAULT 0,
            import_batch_id TEXT REFERENCES import_runs(id),
            imported_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (marketplace_id, cost_date, offer_id)
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}
