// ==========================================
// 账单导入管道 - 字段映射表
// ==========================================
// 职责: 源表头 → 目标字段的固定映射（每种导入类型一张表）
// 红线: 字段取值只按表中的源表头精确查找
// ==========================================

use crate::domain::ledger::{CanonicalRecord, CellValue, LedgerField, RawRow};
use crate::domain::types::ImportType;
use crate::importer::header_normalizer::{ACCRUAL_TEMPLATE, STORAGE_TEMPLATE};
use crate::importer::value_coercion::{clean_text, parse_date, parse_integer, parse_number};
use chrono::NaiveDate;

/// 值转换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionKind {
    Number,
    Integer,
    Text,
    Date,
}

/// 单个目标字段的映射声明
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: LedgerField,
    pub source_header: &'static str,
    pub coercion: CoercionKind,
    pub default: Option<&'static str>, // 单元格为空时的替代值
    pub required: bool,
}

const fn spec(
    field: LedgerField,
    source_header: &'static str,
    coercion: CoercionKind,
    required: bool,
) -> FieldSpec {
    let default = match coercion {
        CoercionKind::Number | CoercionKind::Integer => Some("0"),
        CoercionKind::Text | CoercionKind::Date => None,
    };
    FieldSpec {
        field,
        source_header,
        coercion,
        default,
        required,
    }
}

use CoercionKind::{Date, Integer, Number, Text};
use LedgerField as F;

static ACCRUAL_FIELDS: [FieldSpec; 25] = [
    spec(F::AccrualDate, ACCRUAL_TEMPLATE[0], Date, true),
    spec(F::AccrualType, ACCRUAL_TEMPLATE[1], Text, true),
    spec(F::PostingNumberOrServiceId, ACCRUAL_TEMPLATE[2], Text, false),
    spec(F::AcceptedOrServiceDate, ACCRUAL_TEMPLATE[3], Date, false),
    spec(F::ShipmentWarehouse, ACCRUAL_TEMPLATE[4], Text, false),
    spec(F::AccrualSku, ACCRUAL_TEMPLATE[5], Text, false),
    spec(F::AccrualOfferId, ACCRUAL_TEMPLATE[6], Text, false),
    spec(F::ItemName, ACCRUAL_TEMPLATE[7], Text, false),
    spec(F::Quantity, ACCRUAL_TEMPLATE[8], Number, false),
    spec(F::AmountBeforeFees, ACCRUAL_TEMPLATE[9], Number, false),
    spec(F::OzonFeePercent, ACCRUAL_TEMPLATE[10], Number, false),
    spec(F::OzonFeeAmount, ACCRUAL_TEMPLATE[11], Number, false),
    spec(F::OrderAssembly, ACCRUAL_TEMPLATE[12], Number, false),
    spec(F::DropoffPickupProcessing, ACCRUAL_TEMPLATE[13], Number, false),
    spec(F::MainRoute, ACCRUAL_TEMPLATE[14], Number, false),
    spec(F::LastMile, ACCRUAL_TEMPLATE[15], Number, false),
    spec(F::ReverseMainRoute, ACCRUAL_TEMPLATE[16], Number, false),
    spec(F::ReturnProcessing, ACCRUAL_TEMPLATE[17], Number, false),
    spec(F::CanceledOrUnclaimedProcessing, ACCRUAL_TEMPLATE[18], Number, false),
    spec(F::UnredeemedProcessing, ACCRUAL_TEMPLATE[19], Number, false),
    spec(F::Logistics, ACCRUAL_TEMPLATE[20], Number, false),
    spec(F::LocalizationIndex, ACCRUAL_TEMPLATE[21], Text, false),
    spec(F::AvgDeliveryHours, ACCRUAL_TEMPLATE[22], Number, false),
    spec(F::ReverseLogistics, ACCRUAL_TEMPLATE[23], Number, false),
    spec(F::TotalRub, ACCRUAL_TEMPLATE[24], Number, false),
];

static STORAGE_FIELDS: [FieldSpec; 12] = [
    spec(F::CostDate, STORAGE_TEMPLATE[0], Date, true),
    spec(F::StorageSku, STORAGE_TEMPLATE[1], Text, false),
    spec(F::StorageOfferId, STORAGE_TEMPLATE[2], Text, false),
    spec(F::Category, STORAGE_TEMPLATE[3], Text, false),
    spec(F::DescriptiveType, STORAGE_TEMPLATE[4], Text, false),
    spec(F::StorageWarehouse, STORAGE_TEMPLATE[5], Text, false),
    spec(F::ItemFlag, STORAGE_TEMPLATE[6], Text, false),
    spec(F::TotalVolumeMl, STORAGE_TEMPLATE[7], Number, false),
    spec(F::Instances, STORAGE_TEMPLATE[8], Integer, false),
    spec(F::PaidVolumeMl, STORAGE_TEMPLATE[9], Number, false),
    spec(F::PaidInstances, STORAGE_TEMPLATE[10], Integer, false),
    spec(F::StorageCostAmount, STORAGE_TEMPLATE[11], Number, false),
];

/// 导入类型对应的映射表
pub fn field_table(import_type: ImportType) -> &'static [FieldSpec] {
    match import_type {
        ImportType::AccrualLedger => &ACCRUAL_FIELDS,
        ImportType::StorageCost => &STORAGE_FIELDS,
    }
}

/// 查找字段声明
pub fn field_spec(import_type: ImportType, field: LedgerField) -> Option<&'static FieldSpec> {
    field_table(import_type).iter().find(|s| s.field == field)
}

// ==========================================
// TypedValue - 按声明转换后的字段值
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Number(f64),
    Integer(i64),
    Text(Option<String>),
    Date(Option<NaiveDate>),
}

impl TypedValue {
    /// 转换后仍无值（文本空白 / 日期无法解析）
    pub fn is_blank(&self) -> bool {
        matches!(self, TypedValue::Text(None) | TypedValue::Date(None))
    }
}

impl FieldSpec {
    /// 按源表头取值并按声明转换；空白单元格先替换为默认值
    pub fn coerce(&self, row: &RawRow) -> TypedValue {
        let cell = match row.get(self.source_header) {
            Some(v) if !v.is_blank() => Some(v.clone()),
            _ => self.default.map(CellValue::from),
        };
        let cell = cell.as_ref();
        match self.coercion {
            CoercionKind::Number => TypedValue::Number(parse_number(cell)),
            CoercionKind::Integer => TypedValue::Integer(parse_integer(cell)),
            CoercionKind::Text => TypedValue::Text(clean_text(cell)),
            CoercionKind::Date => TypedValue::Date(parse_date(cell, None)),
        }
    }
}

// ==========================================
// 反向构造（记录 → 原始行）
// ==========================================

/// 由规范化记录的源字段重建原始行（导出/回放用）
///
/// 日期写为 YYYY-MM-DD 文本，空文本写为 Empty
pub fn to_raw_row(record: &CanonicalRecord) -> RawRow {
    let table = field_table(record.import_type());
    table
        .iter()
        .map(|spec| (spec.source_header.to_string(), field_value(record, spec.field)))
        .collect()
}

fn text_cell(value: &Option<String>) -> CellValue {
    match value {
        Some(s) => CellValue::Text(s.clone()),
        None => CellValue::Empty,
    }
}

fn date_cell(value: Option<chrono::NaiveDate>) -> CellValue {
    match value {
        Some(d) => CellValue::Text(d.format("%Y-%m-%d").to_string()),
        None => CellValue::Empty,
    }
}

/// 读取记录中某字段的单元格表示；字段不属于该记录类型时为 Empty
pub fn field_value(record: &CanonicalRecord, field: LedgerField) -> CellValue {
    match record {
        CanonicalRecord::Accrual(r) => match field {
            F::AccrualDate => date_cell(Some(r.accrual_date)),
            F::AccrualType => CellValue::Text(r.accrual_type.clone()),
            F::PostingNumberOrServiceId => text_cell(&r.posting_number_or_service_id),
            F::AcceptedOrServiceDate => date_cell(r.accepted_or_service_date),
            F::ShipmentWarehouse => text_cell(&r.warehouse),
            F::AccrualSku => text_cell(&r.sku),
            F::AccrualOfferId => CellValue::Text(r.offer_id.clone()),
            F::ItemName => text_cell(&r.item_name),
            F::Quantity => CellValue::Number(r.quantity),
            F::AmountBeforeFees => CellValue::Number(r.amount_before_fees),
            F::OzonFeePercent => CellValue::Number(r.ozon_fee_percent),
            F::OzonFeeAmount => CellValue::Number(r.ozon_fee_amount),
            F::OrderAssembly => CellValue::Number(r.order_assembly),
            F::DropoffPickupProcessing => CellValue::Number(r.dropoff_pickup_processing),
            F::MainRoute => CellValue::Number(r.main_route),
            F::LastMile => CellValue::Number(r.last_mile),
            F::ReverseMainRoute => CellValue::Number(r.reverse_main_route),
            F::ReturnProcessing => CellValue::Number(r.return_processing),
            F::CanceledOrUnclaimedProcessing => {
                CellValue::Number(r.canceled_or_unclaimed_processing)
            }
            F::UnredeemedProcessing => CellValue::Number(r.unredeemed_processing),
            F::Logistics => CellValue::Number(r.logistics),
            F::LocalizationIndex => text_cell(&r.localization_index),
            F::AvgDeliveryHours => CellValue::Number(r.avg_delivery_hours),
            F::ReverseLogistics => CellValue::Number(r.reverse_logistics),
            F::TotalRub => CellValue::Number(r.total_rub),
            _ => CellValue::Empty,
        },
        CanonicalRecord::StorageCost(r) => match field {
            F::CostDate => date_cell(Some(r.cost_date)),
            F::StorageSku => text_cell(&r.sku),
            F::StorageOfferId => CellValue::Text(r.offer_id.clone()),
            F::Category => text_cell(&r.category),
            F::DescriptiveType => text_cell(&r.descriptive_type),
            F::StorageWarehouse => text_cell(&r.warehouse),
            F::ItemFlag => text_cell(&r.item_flag),
            F::TotalVolumeMl => CellValue::Number(r.total_volume_ml),
            F::Instances => CellValue::Number(r.instances as f64),
            F::PaidVolumeMl => CellValue::Number(r.paid_volume_ml),
            F::PaidInstances => CellValue::Number(r.paid_instances as f64),
            F::StorageCostAmount => CellValue::Number(r.storage_cost_amount),
            _ => CellValue::Empty,
        },
    }
}
