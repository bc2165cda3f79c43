// ==========================================
// 账单导入管道 - 账单领域模型
// ==========================================
// 职责: 原始行 / 规范化记录 / 去重键
// 对齐: ozon_accruals 表、storage_costs 表
// ==========================================

use crate::domain::types::ImportType;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ==========================================
// CellValue - 未定型的单元格值
// ==========================================
// Excel 单元格保留原始类型（日期序列号是数字）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// 原始行：列名 → 单元格值（生命周期仅限一次转换调用）
pub type RawRow = HashMap<String, CellValue>;

// ==========================================
// LedgerField - 目标字段枚举
// ==========================================
// 字段访问一律经由固定映射表，不做字符串模糊匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerField {
    // ===== 应计账单 =====
    AccrualDate,
    AccrualType,
    PostingNumberOrServiceId,
    AcceptedOrServiceDate,
    ShipmentWarehouse,
    AccrualSku,
    AccrualOfferId,
    ItemName,
    Quantity,
    AmountBeforeFees,
    OzonFeePercent,
    OzonFeeAmount,
    OrderAssembly,
    DropoffPickupProcessing,
    MainRoute,
    LastMile,
    ReverseMainRoute,
    ReturnProcessing,
    CanceledOrUnclaimedProcessing,
    UnredeemedProcessing,
    Logistics,
    LocalizationIndex,
    AvgDeliveryHours,
    ReverseLogistics,
    TotalRub,

    // ===== 仓储费用 =====
    CostDate,
    StorageSku,
    StorageOfferId,
    Category,
    DescriptiveType,
    StorageWarehouse,
    ItemFlag,
    TotalVolumeMl,
    Instances,
    PaidVolumeMl,
    PaidInstances,
    StorageCostAmount,
}

impl LedgerField {
    /// 目标表中的列名
    pub fn column(&self) -> &'static str {
        match self {
            LedgerField::AccrualDate => "accrual_date",
            LedgerField::AccrualType => "accrual_type",
            LedgerField::PostingNumberOrServiceId => "posting_number_or_service_id",
            LedgerField::AcceptedOrServiceDate => "accepted_or_service_date",
            LedgerField::ShipmentWarehouse => "warehouse",
            LedgerField::AccrualSku => "sku",
            LedgerField::AccrualOfferId => "offer_id",
            LedgerField::ItemName => "item_name",
            LedgerField::Quantity => "quantity",
            LedgerField::AmountBeforeFees => "amount_before_fees",
            LedgerField::OzonFeePercent => "ozon_fee_percent",
            LedgerField::OzonFeeAmount => "ozon_fee_amount",
            LedgerField::OrderAssembly => "order_assembly",
            LedgerField::DropoffPickupProcessing => "dropoff_pickup_processing",
            LedgerField::MainRoute => "main_route",
            LedgerField::LastMile => "last_mile",
            LedgerField::ReverseMainRoute => "reverse_main_route",
            LedgerField::ReturnProcessing => "return_processing",
            LedgerField::CanceledOrUnclaimedProcessing => "canceled_or_unclaimed_processing",
            LedgerField::UnredeemedProcessing => "unredeemed_processing",
            LedgerField::Logistics => "logistics",
            LedgerField::LocalizationIndex => "localization_index",
            LedgerField::AvgDeliveryHours => "avg_delivery_hours",
            LedgerField::ReverseLogistics => "reverse_logistics",
            LedgerField::TotalRub => "total_rub",
            LedgerField::CostDate => "cost_date",
            LedgerField::StorageSku => "sku",
            LedgerField::StorageOfferId => "offer_id",
            LedgerField::Category => "category",
            LedgerField::DescriptiveType => "descriptive_type",
            LedgerField::StorageWarehouse => "warehouse",
            LedgerField::ItemFlag => "item_flag",
            LedgerField::TotalVolumeMl => "total_volume_ml",
            LedgerField::Instances => "instances",
            LedgerField::PaidVolumeMl => "paid_volume_ml",
            LedgerField::PaidInstances => "paid_instances",
            LedgerField::StorageCostAmount => "storage_cost_amount",
        }
    }
}

// ==========================================
// AccrualRecord - 应计账单记录
// ==========================================
// 自然键: (marketplace_id, accrual_date, offer_id, accrual_type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccrualRecord {
    // ===== 自然键 =====
    pub marketplace_id: String,
    pub accrual_date: NaiveDate,
    pub offer_id: String, // 商品编码（缺失时为 SERVICE_ 兜底键）
    pub accrual_type: String,

    // ===== 文本字段 =====
    pub accrual_type_raw: Option<String>,  // 原始类型（审计用）
    pub accrual_type_norm: Option<String>, // 归一化类型（分析用）
    pub posting_number_or_service_id: Option<String>,
    pub accepted_or_service_date: Option<NaiveDate>,
    pub warehouse: Option<String>,
    pub sku: Option<String>,
    pub item_name: Option<String>,
    pub localization_index: Option<String>,

    // ===== 数值字段 =====
    pub quantity: f64,
    pub amount_before_fees: f64,
    pub ozon_fee_percent: f64,
    pub ozon_fee_amount: f64,
    pub order_assembly: f64,
    pub dropoff_pickup_processing: f64,
    pub main_route: f64,
    pub last_mile: f64,
    pub reverse_main_route: f64,
    pub return_processing: f64,
    pub canceled_or_unclaimed_processing: f64,
    pub unredeemed_processing: f64,
    pub logistics: f64,
    pub avg_delivery_hours: f64,
    pub reverse_logistics: f64,
    pub total_rub: f64,

    // ===== 元信息 =====
    pub import_batch_id: String, // 关联 import_runs.id
    pub row_index: usize,        // 源文件行序号（去重 last-wins 依据）
}

// ==========================================
// StorageCostRecord - 仓储费用记录
// ==========================================
// 自然键: (marketplace_id, cost_date, offer_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCostRecord {
    // ===== 自然键 =====
    pub marketplace_id: String,
    pub cost_date: NaiveDate,
    pub offer_id: String,

    // ===== 文本字段 =====
    pub sku: Option<String>,
    pub category: Option<String>,
    pub descriptive_type: Option<String>,
    pub warehouse: Option<String>,
    pub item_flag: Option<String>,

    // ===== 数值字段 =====
    pub total_volume_ml: f64,
    pub instances: i64,
    pub paid_volume_ml: f64,
    pub paid_instances: i64,
    pub storage_cost_amount: f64,

    // ===== 元信息 =====
    pub import_batch_id: String,
    pub row_index: usize,
}

// ==========================================
// CanonicalRecord - 规范化记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CanonicalRecord {
    Accrual(AccrualRecord),
    StorageCost(StorageCostRecord),
}

impl CanonicalRecord {
    pub fn import_type(&self) -> ImportType {
        match self {
            CanonicalRecord::Accrual(_) => ImportType::AccrualLedger,
            CanonicalRecord::StorageCost(_) => ImportType::StorageCost,
        }
    }

    pub fn row_index(&self) -> usize {
        match self {
            CanonicalRecord::Accrual(r) => r.row_index,
            CanonicalRecord::StorageCost(r) => r.row_index,
        }
    }

    pub fn offer_id(&self) -> &str {
        match self {
            CanonicalRecord::Accrual(r) => &r.offer_id,
            CanonicalRecord::StorageCost(r) => &r.offer_id,
        }
    }

    /// 由自然键字段构造去重键
    pub fn dedup_key(&self) -> DedupKey {
        match self {
            CanonicalRecord::Accrual(r) => DedupKey::from_parts(&[
                &r.marketplace_id,
                &r.accrual_date.to_string(),
                &r.offer_id,
                &r.accrual_type,
            ]),
            CanonicalRecord::StorageCost(r) => DedupKey::from_parts(&[
                &r.marketplace_id,
                &r.cost_date.to_string(),
                &r.offer_id,
            ]),
        }
    }
}

// ==========================================
// DedupKey - 去重键
// ==========================================
// 各字段以 U+001F 分隔，字段内容不会包含该控制符（清洗时已剔除）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    const SEPARATOR: char = '\u{1F}';

    pub fn from_parts(parts: &[&str]) -> Self {
        let mut key = String::new();
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                key.push(Self::SEPARATOR);
            }
            key.push_str(part);
        }
        DedupKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.replace(Self::SEPARATOR, "|"))
    }
}
