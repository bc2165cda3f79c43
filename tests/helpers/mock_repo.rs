// ==========================================
// Mock 仓储实现 - 用于集成测试
// ==========================================
// MockLedgerRepo: 记录每次 upsert 调用，可按调用序号注入失败
// MockRunRepo: 内存中的 import_runs，可模拟创建失败
// ==========================================

use async_trait::async_trait;
use marketplace_ledger_import::domain::{
    CanonicalRecord, DedupKey, ImportRun, ImportType, RunStatus, RunTally,
};
use marketplace_ledger_import::repository::{
    ImportRunRepository, LedgerRepository, RepositoryError, RepositoryResult,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// 注入的单次调用结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Ok,
    Busy,
    Broken,
}

#[derive(Default)]
struct LedgerState {
    calls: Vec<Vec<CanonicalRecord>>,
    script: VecDeque<Scripted>,
    stored: HashMap<DedupKey, CanonicalRecord>,
}

#[derive(Default)]
pub struct MockLedgerRepo {
    state: Mutex<LedgerState>,
}

impl MockLedgerRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次为后续调用设定结果；脚本用完后一律成功
    pub fn with_script(script: Vec<Scripted>) -> Self {
        let repo = Self::default();
        repo.state.lock().unwrap().script = script.into();
        repo
    }

    pub fn commit_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn call_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().calls.iter().map(|c| c.len()).collect()
    }

    pub fn calls(&self) -> Vec<Vec<CanonicalRecord>> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn stored_count(&self) -> usize {
        self.state.lock().unwrap().stored.len()
    }
}

#[async_trait]
impl LedgerRepository for MockLedgerRepo {
    async fn upsert_batch(
        &self,
        _import_type: ImportType,
        records: &[CanonicalRecord],
    ) -> RepositoryResult<usize> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(records.to_vec());

        match state.script.pop_front().unwrap_or(Scripted::Ok) {
            Scripted::Busy => return Err(RepositoryError::StorageBusy("database is locked".into())),
            Scripted::Broken => {
                return Err(RepositoryError::DatabaseQueryError("disk I/O error".into()))
            }
            Scripted::Ok => {}
        }

        // 与真实存储一致：批内同键整批失败
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.dedup_key()) {
                return Err(RepositoryError::DuplicateConflictKey(
                    record.dedup_key().to_string(),
                ));
            }
        }
        for record in records {
            state.stored.insert(record.dedup_key(), record.clone());
        }
        Ok(records.len())
    }
}

// ==========================================
// MockRunRepo
// ==========================================
#[derive(Default)]
struct RunState {
    runs: HashMap<String, ImportRun>,
    transitions: Vec<RunStatus>,
}

#[derive(Default)]
pub struct MockRunRepo {
    state: Mutex<RunState>,
    fail_create: bool,
}

impl MockRunRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建运行即失败（模拟存储不可达）
    pub fn unreachable() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn run(&self, run_id: &str) -> Option<ImportRun> {
        self.state.lock().unwrap().runs.get(run_id).cloned()
    }

    /// 状态写入顺序（含创建时的 pending）
    pub fn transitions(&self) -> Vec<RunStatus> {
        self.state.lock().unwrap().transitions.clone()
    }
}

#[async_trait]
impl ImportRunRepository for MockRunRepo {
    async fn create_run(&self, run: &ImportRun) -> RepositoryResult<()> {
        if self.fail_create {
            return Err(RepositoryError::DatabaseConnectionError(
                "unable to open database file".into(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        state.transitions.push(run.status);
        state.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn update_status(&self, run_id: &str, status: RunStatus) -> RepositoryResult<()> {
        let mut state = self.state.lock().unwrap();
        let run = state.runs.get_mut(run_id).ok_or_else(|| RepositoryError::NotFound {
            entity: "ImportRun".into(),
            id: run_id.into(),
        })?;
        run.status = status;
        state.transitions.push(status);
        Ok(())
    }

    async fn finalize_run(
        &self,
        run_id: &str,
        status: RunStatus,
        tally: &RunTally,
    ) -> RepositoryResult<()> {
        let mut state = self.state.lock().unwrap();
        let run = state.runs.get_mut(run_id).ok_or_else(|| RepositoryError::NotFound {
            entity: "ImportRun".into(),
            id: run_id.into(),
        })?;
        run.status = status;
        run.records_imported = tally.records_imported;
        run.records_failed = tally.records_failed;
        run.records_deduplicated = tally.records_deduplicated;
        run.error_message = tally.error_message.clone();
        run.completed_at = Some(chrono::Utc::now());
        state.transitions.push(status);
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> RepositoryResult<Option<ImportRun>> {
        Ok(self.run(run_id))
    }

    async fn list_recent_runs(&self, limit: usize) -> RepositoryResult<Vec<ImportRun>> {
        let mut runs: Vec<ImportRun> = self.state.lock().unwrap().runs.values().cloned().collect();
        runs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        runs.truncate(limit);
        Ok(runs)
    }
}
