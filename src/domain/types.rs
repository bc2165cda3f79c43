// ==========================================
// 账单导入管道 - 领域枚举类型
// ==========================================
// 职责: 导入类型 / 运行状态 等固定枚举
// 约定: 数据库存储为 snake_case 字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// ImportType - 导入类型
// ==========================================
// 每种导入类型对应一张目标表与一个冲突键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    AccrualLedger, // 应计账单（ozon_accruals）
    StorageCost,   // 仓储费用（storage_costs）
}

impl ImportType {
    pub const ALL: [ImportType; 2] = [ImportType::AccrualLedger, ImportType::StorageCost];

    /// 数据库/接口使用的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::AccrualLedger => "accrual_ledger",
            ImportType::StorageCost => "storage_cost",
        }
    }

    /// 目标表名
    pub fn target_table(&self) -> &'static str {
        match self {
            ImportType::AccrualLedger => "ozon_accruals",
            ImportType::StorageCost => "storage_costs",
        }
    }

    /// 冲突键（upsert 的 conflict target）
    pub fn conflict_target(&self) -> &'static [&'static str] {
        match self {
            ImportType::AccrualLedger => &["marketplace_id", "accrual_date", "offer_id", "accrual_type"],
            ImportType::StorageCost => &["marketplace_id", "cost_date", "offer_id"],
        }
    }
}

impl fmt::Display for ImportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "accrual_ledger" | "accruals" => Ok(ImportType::AccrualLedger),
            "storage_cost" | "storage_costs" => Ok(ImportType::StorageCost),
            other => Err(format!("未知导入类型: {}", other)),
        }
    }
}

// ==========================================
// RunStatus - 导入运行状态
// ==========================================
// 状态机: pending → processing → {completed, failed}
// completed / failed 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Processing => "processing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// 状态转换是否合法
    ///
    /// pending 也允许直接进入 failed（处理前的初始化失败）
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Processing)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Processing, RunStatus::Completed)
                | (RunStatus::Processing, RunStatus::Failed)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(RunStatus::Pending),
            "processing" => Ok(RunStatus::Processing),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            other => Err(format!("未知运行状态: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_type_round_trip_str() {
        for t in ImportType::ALL {
            assert_eq!(t.as_str().parse::<ImportType>().unwrap(), t);
        }
        // 兼容旧前端的取值
        assert_eq!("accruals".parse::<ImportType>().unwrap(), ImportType::AccrualLedger);
        assert!("reviews".parse::<ImportType>().is_err());
    }

    #[test]
    fn test_run_status_transitions() {
        assert!(RunStatus::Pending.can_transition_to(RunStatus::Processing));
        assert!(RunStatus::Processing.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Processing.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Processing));
        assert!(!RunStatus::Pending.can_transition_to(RunStatus::Completed));
    }

    #[test]
    fn test_terminal_states() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(!RunStatus::Processing.is_terminal());
    }
}
