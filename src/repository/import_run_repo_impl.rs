// ==========================================
// 账单导入管道 - 导入运行 Repository 实现
// ==========================================
// 职责: import_runs 表 CRUD（使用 rusqlite）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import_run::{ImportRun, RunTally};
use crate::domain::types::{ImportType, RunStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_run_repo::ImportRunRepository;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};

const RUN_COLUMNS: &str = r#"
    id, marketplace_id, import_type, source_file_name, period_start, period_end,
    status, records_imported, records_failed, records_deduplicated, error_message,
    created_at, completed_at
"#;

pub struct ImportRunRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportRunRepositoryImpl {
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

    fn map_row(row: &Row<'_>) -> rusqlite::Result<RunRow> {
        Ok(RunRow {
            id: row.get(0)?,
            marketplace_id: row.get(1)?,
            import_type: row.get(2)?,
            source_file_name: row.get(3)?,
            period_start: row.get(4)?,
            period_end: row.get(5)?,
            status: row.get(6)?,
            records_imported: row.get(7)?,
            records_failed: row.get(8)?,
            records_deduplicated: row.get(9)?,
            error_message: row.get(10)?,
            created_at: row.get(11)?,
            completed_at: row.get(12)?,
        })
    }
}

// ==========================================
// RunRow - import_runs 原始行（文本列尚未解析）
// ==========================================
struct RunRow {
    id: String,
    marketplace_id: String,
    import_type: String,
    source_file_name: Option<String>,
    period_start: Option<String>,
    period_end: Option<String>,
    status: String,
    records_imported: i64,
    records_failed: i64,
    records_deduplicated: i64,
    error_message: Option<String>,
    created_at: String,
    completed_at: Option<String>,
}

fn field_error(field: &str, message: impl Into<String>) -> RepositoryError {
    RepositoryError::FieldValueError {
        field: field.to_string(),
        message: message.into(),
    }
}

fn parse_date(field: &str, raw: Option<String>) -> RepositoryResult<Option<NaiveDate>> {
    raw.map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").map_err(|e| field_error(field, e.to_string())))
        .transpose()
}

fn parse_timestamp(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| field_error(field, e.to_string()))
}

impl TryFrom<RunRow> for ImportRun {
    type Error = RepositoryError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        Ok(ImportRun {
            import_type: row
                .import_type
                .parse::<ImportType>()
                .map_err(|e| field_error("import_type", e))?,
            status: row
                .status
                .parse::<RunStatus>()
                .map_err(|e| field_error("status", e))?,
            period_start: parse_date("period_start", row.period_start)?,
            period_end: parse_date("period_end", row.period_end)?,
            created_at: parse_timestamp("created_at", &row.created_at)?,
            completed_at: row
                .completed_at
                .as_deref()
                .map(|s| parse_timestamp("completed_at", s))
                .transpose()?,
            id: row.id,
            marketplace_id: row.marketplace_id,
            source_file_name: row.source_file_name,
            records_imported: row.records_imported,
            records_failed: row.records_failed,
            records_deduplicated: row.records_deduplicated,
            error_message: row.error_message,
        })
    }
}

#[async_trait]
impl ImportRunRepository for ImportRunRepositoryImpl {
    async fn create_run(&self, run: &ImportRun) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO import_runs (
                id, marketplace_id, import_type, source_file_name, period_start, period_end,
                status, records_imported, records_failed, records_deduplicated, error_message,
                created_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                run.id,
                run.marketplace_id,
                run.import_type.as_str(),
                run.source_file_name,
                run.period_start.map(|d| d.to_string()),
                run.period_end.map(|d| d.to_string()),
                run.status.as_str(),
                run.records_imported,
                run.records_failed,
                run.records_deduplicated,
                run.error_message,
                run.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                run.completed_at.map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            ],
        )?;
        Ok(())
    }

    async fn update_status(&self, run_id: &str, status: RunStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE import_runs SET status = ?1 WHERE id = ?2",
            params![status.as_str(), run_id],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportRun".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    async fn finalize_run(
        &self,
        run_id: &str,
        status: RunStatus,
        tally: &RunTally,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            r#"
            UPDATE import_runs
            SET status = ?1,
                records_imported = ?2,
                records_failed = ?3,
                records_deduplicated = ?4,
                error_message = ?5,
                completed_at = ?6
            WHERE id = ?7
            "#,
            params![
                status.as_str(),
                tally.records_imported,
                tally.records_failed,
                tally.records_deduplicated,
                tally.error_message,
                Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
                run_id,
            ],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportRun".to_string(),
                id: run_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> RepositoryResult<Option<ImportRun>> {
        let conn = self.get_conn()?;
        let sql = format!("SELECT {} FROM import_runs WHERE id = ?1", RUN_COLUMNS);
        let row = conn
            .query_row(&sql, params![run_id], Self::map_row)
            .optional()?;
        row.map(ImportRun::try_from).transpose()
    }

    async fn list_recent_runs(&self, limit: usize) -> RepositoryResult<Vec<ImportRun>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM import_runs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            RUN_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ImportRun::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn repo() -> ImportRunRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ImportRunRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[tokio::test]
    async fn test_create_and_get_run() {
        let repo = repo();
        let run = ImportRun::new_pending(
            "mp-1",
            ImportType::AccrualLedger,
            Some("accruals_jan.xlsx".to_string()),
            NaiveDate::from_ymd_opt(2025, 1, 1),
            NaiveDate::from_ymd_opt(2025, 1, 31),
        );
        repo.create_run(&run).await.unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Pending);
        assert_eq!(loaded.import_type, ImportType::AccrualLedger);
        assert_eq!(loaded.period_end, NaiveDate::from_ymd_opt(2025, 1, 31));
        assert_eq!(loaded.source_file_name.as_deref(), Some("accruals_jan.xlsx"));
        assert!(loaded.completed_at.is_none());

        assert!(repo.get_run("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_finalize_run() {
        let repo = repo();
        let run = ImportRun::new_pending("mp-1", ImportType::StorageCost, None, None, None);
        repo.create_run(&run).await.unwrap();
        repo.update_status(&run.id, RunStatus::Processing).await.unwrap();

        let tally = RunTally {
            records_imported: 10,
            records_failed: 2,
            records_deduplicated: 1,
            error_message: Some("行 3: 必填字段为空: cost_date".to_string()),
        };
        repo.finalize_run(&run.id, RunStatus::Completed, &tally)
            .await
            .unwrap();

        let loaded = repo.get_run(&run.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, RunStatus::Completed);
        assert_eq!(loaded.records_imported, 10);
        assert_eq!(loaded.records_failed, 2);
        assert_eq!(loaded.records_deduplicated, 1);
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_update_missing_run() {
        let repo = repo();
        let err = repo
            .update_status("missing", RunStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_list_recent_runs_newest_first() {
        let repo = repo();
        let mut ids = Vec::new();
        for offset in 0..3 {
            let mut run = ImportRun::new_pending("mp-1", ImportType::StorageCost, None, None, None);
            run.created_at = Utc::now() + chrono::Duration::seconds(offset);
            repo.create_run(&run).await.unwrap();
            ids.push(run.id);
        }

        let runs = repo.list_recent_runs(2).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, ids[2]);
        assert_eq!(runs[1].id, ids[1]);
    }
}
