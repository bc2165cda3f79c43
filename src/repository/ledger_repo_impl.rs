// ==========================================
// 账单导入管道 - 账单写入 Repository 实现
// ==========================================
// 职责: ozon_accruals / storage_costs 的批次 upsert（使用 rusqlite）
// 红线: 一批一个事务；批内同键直接拒绝，整批不写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::ledger::{AccrualRecord, CanonicalRecord, StorageCostRecord};
use crate::domain::types::ImportType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::ledger_repo::LedgerRepository;
use async_trait::async_trait;
use rusqlite::{params, Connection, Statement};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

const ACCRUAL_COLUMNS: [&str; 29] = [
    "marketplace_id",
    "accrual_date",
    "offer_id",
    "accrual_type",
    "accrual_type_raw",
    "accrual_type_norm",
    "posting_number_or_service_id",
    "accepted_or_service_date",
    "warehouse",
    "sku",
    "item_name",
    "localization_index",
    "quantity",
    "amount_before_fees",
    "ozon_fee_percent",
    "ozon_fee_amount",
    "order_assembly",
    "dropoff_pickup_processing",
    "main_route",
    "last_mile",
    "reverse_main_route",
    "return_processing",
    "canceled_or_unclaimed_processing",
    "unredeemed_processing",
    "logistics",
    "avg_delivery_hours",
    "reverse_logistics",
    "total_rub",
    "import_batch_id",
];

const STORAGE_COLUMNS: [&str; 14] = [
    "marketplace_id",
    "cost_date",
    "offer_id",
    "sku",
    "category",
    "descriptive_type",
    "warehouse",
    "item_flag",
    "total_volume_ml",
    "instances",
    "paid_volume_ml",
    "paid_instances",
    "storage_cost_amount",
    "import_batch_id",
];

/// 生成 upsert 语句；冲突时更新全部非键列（imported_at 保留首次写入时间）
fn upsert_sql(table: &str, columns: &[&str], conflict_target: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !conflict_target.contains(*c))
        .map(|c| format!("{c} = excluded.{c}"))
        .collect();

    format!(
        "INSERT INTO {table} ({cols}) VALUES ({vals}) ON CONFLICT ({target}) DO UPDATE SET {updates}",
        table = table,
        cols = columns.join(", "),
        vals = placeholders.join(", "),
        target = conflict_target.join(", "),
        updates = updates.join(", "),
    )
}

// ==========================================
// LedgerRepositoryImpl
// ==========================================
pub struct LedgerRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl LedgerRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 某营销平台在目标表中的记录数
    pub fn count_records(
        &self,
        import_type: ImportType,
        marketplace_id: &str,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE marketplace_id = ?1",
            import_type.target_table()
        );
        let count = conn.query_row(&sql, params![marketplace_id], |row| row.get(0))?;
        Ok(count)
    }

    /// 批内校验：类型一致且冲突键唯一
    fn check_batch(import_type: ImportType, records: &[CanonicalRecord]) -> RepositoryResult<()> {
        let mut seen = HashSet::with_capacity(records.len());
        for record in records {
            if record.import_type() != import_type {
                return Err(RepositoryError::MixedImportType {
                    expected: import_type.to_string(),
                });
            }
            let key = record.dedup_key();
            if !seen.insert(key.clone()) {
                return Err(RepositoryError::DuplicateConflictKey(key.to_string()));
            }
        }
        Ok(())
    }

    fn upsert_accrual(stmt: &mut Statement<'_>, r: &AccrualRecord) -> rusqlite::Result<usize> {
        stmt.execute(params![
            r.marketplace_id,
            r.accrual_date.to_string(),
            r.offer_id,
            r.accrual_type,
            r.accrual_type_raw,
            r.accrual_type_norm,
            r.posting_number_or_service_id,
            r.accepted_or_service_date.map(|d| d.to_string()),
            r.warehouse,
            r.sku,
            r.item_name,
            r.localization_index,
            r.quantity,
            r.amount_before_fees,
            r.ozon_fee_percent,
            r.ozon_fee_amount,
            r.order_assembly,
            r.dropoff_pickup_processing,
            r.main_route,
            r.last_mile,
            r.reverse_main_route,
            r.return_processing,
            r.canceled_or_unclaimed_processing,
            r.unredeemed_processing,
            r.logistics,
            r.avg_delivery_hours,
            r.reverse_logistics,
            r.total_rub,
            r.import_batch_id,
        ])
    }

    fn upsert_storage_cost(
        stmt: &mut Statement<'_>,
        r: &StorageCostRecord,
    ) -> rusqlite::Result<usize> {
        stmt.execute(params![
            r.marketplace_id,
            r.cost_date.to_string(),
            r.offer_id,
            r.sku,
            r.category,
            r.descriptive_type,
            r.warehouse,
            r.item_flag,
            r.total_volume_ml,
            r.instances,
            r.paid_volume_ml,
            r.paid_instances,
            r.storage_cost_amount,
            r.import_batch_id,
        ])
    }
}

#[async_trait]
impl LedgerRepository for LedgerRepositoryImpl {
    async fn upsert_batch(
        &self,
        import_type: ImportType,
        records: &[CanonicalRecord],
    ) -> RepositoryResult<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        Self::check_batch(import_type, records)?;

        let columns: &[&str] = match import_type {
            ImportType::AccrualLedger => &ACCRUAL_COLUMNS,
            ImportType::StorageCost => &STORAGE_COLUMNS,
        };
        let sql = upsert_sql(
            import_type.target_table(),
            columns,
            import_type.conflict_target(),
        );

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(&sql)?;
            for record in records {
                written += match record {
                    CanonicalRecord::Accrual(r) => Self::upsert_accrual(&mut stmt, r)?,
                    CanonicalRecord::StorageCost(r) => Self::upsert_storage_cost(&mut stmt, r)?,
                };
            }
        }
        tx.commit()?;

        Ok(written)
    }
}
