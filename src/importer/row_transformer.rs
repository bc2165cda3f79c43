// ==========================================
// 账单导入管道 - 行转换器实现
// ==========================================
// 职责: RawRow → CanonicalRecord（按映射表转换 + 必填校验 + 兜底键）
// 红线: 纯函数，不写日志；诊断信息随结果返回
// ==========================================

use crate::domain::ledger::{
    AccrualRecord, CanonicalRecord, LedgerField, RawRow, StorageCostRecord,
};
use crate::domain::types::ImportType;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_table::{field_table, CoercionKind, FieldSpec, TypedValue};
use crate::importer::ledger_importer_trait::RowTransformer as RowTransformerTrait;
use crate::importer::value_coercion::normalize_for_analytics;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 兜底键前缀
pub const FALLBACK_KEY_PREFIX: &str = "SERVICE_";

/// 仓储费用在 SKU 也缺失时的兜底键
pub const STORAGE_FALLBACK_KEY: &str = "SERVICE_STORAGE";

// ==========================================
// TransformContext - 一次运行内不变的转换参数
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformContext {
    pub import_type: ImportType,
    pub marketplace_id: String,
    pub run_id: String,                  // 写入 import_batch_id
    pub period_start: Option<NaiveDate>, // 记录日期无法解析时的兜底
}

// ==========================================
// TransformOutcome - 单行转换结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformOutcome {
    pub record: CanonicalRecord,
    pub used_fallback_key: bool,
    pub warnings: Vec<String>,
}

// ==========================================
// LedgerRowTransformer
// ==========================================
#[derive(Debug, Default, Clone, Copy)]
pub struct LedgerRowTransformer;

impl LedgerRowTransformer {
    pub fn new() -> Self {
        Self
    }
}

impl RowTransformerTrait for LedgerRowTransformer {
    fn transform(
        &self,
        ctx: &TransformContext,
        row_index: usize,
        row: &RawRow,
    ) -> ImportResult<TransformOutcome> {
        let typed = TypedRow::build(ctx, row_index, row, field_table(ctx.import_type))?;
        match ctx.import_type {
            ImportType::AccrualLedger => typed.accrual(),
            ImportType::StorageCost => typed.storage_cost(),
        }
    }
}

// ==========================================
// TypedRow - 按映射表转换后的单行
// ==========================================
// 字段值只来自映射表；必填校验在构造时完成
struct TypedRow<'a> {
    ctx: &'a TransformContext,
    row_index: usize,
    values: HashMap<LedgerField, TypedValue>,
    warnings: Vec<String>,
}

impl<'a> TypedRow<'a> {
    /// 逐列按声明转换；必填字段转换后为空时回退或报错
    fn build(
        ctx: &'a TransformContext,
        row_index: usize,
        row: &RawRow,
        table: &[FieldSpec],
    ) -> ImportResult<Self> {
        let mut typed = TypedRow {
            ctx,
            row_index,
            values: HashMap::with_capacity(table.len()),
            warnings: Vec::new(),
        };
        for spec in table {
            let mut value = spec.coerce(row);
            if spec.required && value.is_blank() {
                value = typed.backfill(spec)?;
            }
            typed.values.insert(spec.field, value);
        }
        Ok(typed)
    }

    /// 必填日期回退到账期起始日；其余必填字段为空 → 行校验失败
    fn backfill(&mut self, spec: &FieldSpec) -> ImportResult<TypedValue> {
        match (spec.coercion, self.ctx.period_start) {
            (CoercionKind::Date, Some(fallback)) => {
                self.warnings.push(format!(
                    "行 {}: {} 无法解析，使用账期起始日 {}",
                    self.row_index,
                    spec.field.column(),
                    fallback
                ));
                Ok(TypedValue::Date(Some(fallback)))
            }
            _ => Err(self.missing(spec.field)),
        }
    }

    fn missing(&self, field: LedgerField) -> ImportError {
        ImportError::RowValidation {
            row: self.row_index,
            field: field.column().to_string(),
        }
    }

    fn text(&self, field: LedgerField) -> Option<String> {
        match self.values.get(&field) {
            Some(TypedValue::Text(v)) => v.clone(),
            _ => None,
        }
    }

    fn number(&self, field: LedgerField) -> f64 {
        match self.values.get(&field) {
            Some(TypedValue::Number(n)) => *n,
            _ => 0.0,
        }
    }

    fn integer(&self, field: LedgerField) -> i64 {
        match self.values.get(&field) {
            Some(TypedValue::Integer(n)) => *n,
            _ => 0,
        }
    }

    fn date(&self, field: LedgerField) -> Option<NaiveDate> {
        match self.values.get(&field) {
            Some(TypedValue::Date(d)) => *d,
            _ => None,
        }
    }

    fn required_text(&self, field: LedgerField) -> ImportResult<String> {
        self.text(field).ok_or_else(|| self.missing(field))
    }

    fn required_date(&self, field: LedgerField) -> ImportResult<NaiveDate> {
        self.date(field).ok_or_else(|| self.missing(field))
    }

    /// 商品编码为空时合成兜底键
    fn offer_id_or_fallback(
        &mut self,
        offer_id: Option<String>,
        fallback: String,
    ) -> (String, bool) {
        match offer_id {
            Some(id) => (id, false),
            None => {
                self.warnings.push(format!(
                    "行 {}: 商品编码为空，使用兜底键 {}",
                    self.row_index, fallback
                ));
                (fallback, true)
            }
        }
    }

    fn accrual(mut self) -> ImportResult<TransformOutcome> {
        let accrual_date = self.required_date(LedgerField::AccrualDate)?;
        let accrual_type = self.required_text(LedgerField::AccrualType)?;
        let accrual_type_norm = normalize_for_analytics(&accrual_type);

        let posting = self.text(LedgerField::PostingNumberOrServiceId);
        let fallback = match &posting {
            Some(p) => format!("{}{}", FALLBACK_KEY_PREFIX, p),
            None => format!("{}{}", FALLBACK_KEY_PREFIX, accrual_type_norm),
        };
        let offer_id = self.text(LedgerField::AccrualOfferId);
        let (offer_id, used_fallback_key) = self.offer_id_or_fallback(offer_id, fallback);

        let record = AccrualRecord {
            marketplace_id: self.ctx.marketplace_id.clone(),
            accrual_date,
            offer_id,
            accrual_type: accrual_type.clone(),
            accrual_type_raw: Some(accrual_type),
            accrual_type_norm: Some(accrual_type_norm),
            posting_number_or_service_id: posting,
            accepted_or_service_date: self.date(LedgerField::AcceptedOrServiceDate),
            warehouse: self.text(LedgerField::ShipmentWarehouse),
            sku: self.text(LedgerField::AccrualSku),
            item_name: self.text(LedgerField::ItemName),
            localization_index: self.text(LedgerField::LocalizationIndex),
            quantity: self.number(LedgerField::Quantity),
            amount_before_fees: self.number(LedgerField::AmountBeforeFees),
            ozon_fee_percent: self.number(LedgerField::OzonFeePercent),
            ozon_fee_amount: self.number(LedgerField::OzonFeeAmount),
            order_assembly: self.number(LedgerField::OrderAssembly),
            dropoff_pickup_processing: self.number(LedgerField::DropoffPickupProcessing),
            main_route: self.number(LedgerField::MainRoute),
            last_mile: self.number(LedgerField::LastMile),
            reverse_main_route: self.number(LedgerField::ReverseMainRoute),
            return_processing: self.number(LedgerField::ReturnProcessing),
            canceled_or_unclaimed_processing: self
                .number(LedgerField::CanceledOrUnclaimedProcessing),
            unredeemed_processing: self.number(LedgerField::UnredeemedProcessing),
            logistics: self.number(LedgerField::Logistics),
            avg_delivery_hours: self.number(LedgerField::AvgDeliveryHours),
            reverse_logistics: self.number(LedgerField::ReverseLogistics),
            total_rub: self.number(LedgerField::TotalRub),
            import_batch_id: self.ctx.run_id.clone(),
            row_index: self.row_index,
        };

        Ok(TransformOutcome {
            record: CanonicalRecord::Accrual(record),
            used_fallback_key,
            warnings: self.warnings,
        })
    }

    fn storage_cost(mut self) -> ImportResult<TransformOutcome> {
        let cost_date = self.required_date(LedgerField::CostDate)?;

        let sku = self.text(LedgerField::StorageSku);
        let fallback = match &sku {
            Some(s) => format!("{}{}", FALLBACK_KEY_PREFIX, s),
            None => STORAGE_FALLBACK_KEY.to_string(),
        };
        let offer_id = self.text(LedgerField::StorageOfferId);
        let (offer_id, used_fallback_key) = self.offer_id_or_fallback(offer_id, fallback);

        let record = StorageCostRecord {
            marketplace_id: self.ctx.marketplace_id.clone(),
            cost_date,
            offer_id,
            sku,
            category: self.text(LedgerField::Category),
            descriptive_type: self.text(LedgerField::DescriptiveType),
            warehouse: self.text(LedgerField::StorageWarehouse),
            item_flag: self.text(LedgerField::ItemFlag),
            total_volume_ml: self.number(LedgerField::TotalVolumeMl),
            instances: self.integer(LedgerField::Instances),
            paid_volume_ml: self.number(LedgerField::PaidVolumeMl),
            paid_instances: self.integer(LedgerField::PaidInstances),
            storage_cost_amount: self.number(LedgerField::StorageCostAmount),
            import_batch_id: self.ctx.run_id.clone(),
            row_index: self.row_index,
        };

        Ok(TransformOutcome {
            record: CanonicalRecord::StorageCost(record),
            used_fallback_key,
            warnings: self.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::CellValue;
    use crate::importer::field_table::{field_spec, to_raw_row};

    fn ctx(import_type: ImportType, period_start: Option<NaiveDate>) -> TransformContext {
        TransformContext {
            import_type,
            marketplace_id: "mp-1".to_string(),
            run_id: "run-1".to_string(),
            period_start,
        }
    }

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
            .collect()
    }

    fn accrual(outcome: &TransformOutcome) -> &AccrualRecord {
        match &outcome.record {
            CanonicalRecord::Accrual(r) => r,
            other => panic!("unexpected record: {:?}", other),
        }
    }

    fn storage(outcome: &TransformOutcome) -> &StorageCostRecord {
        match &outcome.record {
            CanonicalRecord::StorageCost(r) => r,
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn test_accrual_row() {
        let raw = row(&[
            ("Дата начисления", "20.01.2025"),
            ("Тип начисления", " Оплата  Эквайринга "),
            ("Артикул", "ART-1"),
            ("SKU", "123456"),
            ("Количество", "2"),
            ("Итого, руб.", "-1 234,50"),
        ]);
        let outcome = LedgerRowTransformer::new()
            .transform(&ctx(ImportType::AccrualLedger, None), 1, &raw)
            .unwrap();
        let r = accrual(&outcome);

        assert!(!outcome.used_fallback_key);
        assert!(outcome.warnings.is_empty());
        assert_eq!(r.accrual_date, NaiveDate::from_ymd_opt(2025, 1, 20).unwrap());
        assert_eq!(r.offer_id, "ART-1");
        assert_eq!(r.accrual_type, "Оплата  Эквайринга");
        assert_eq!(r.accrual_type_norm.as_deref(), Some("оплата эквайринга"));
        assert_eq!(r.sku.as_deref(), Some("123456"));
        assert_eq!(r.quantity, 2.0);
        assert_eq!(r.total_rub, -1234.5);
        assert_eq!(r.logistics, 0.0);
        assert_eq!(r.import_batch_id, "run-1");
    }

    #[test]
    fn test_accrual_fallback_keys() {
        let t = LedgerRowTransformer::new();
        let c = ctx(ImportType::AccrualLedger, None);

        let with_posting = row(&[
            ("Дата начисления", "2025-01-20"),
            ("Тип начисления", "Хранение"),
            ("Номер отправления или идентификатор услуги", "POST-77"),
        ]);
        let outcome = t.transform(&c, 4, &with_posting).unwrap();
        assert!(outcome.used_fallback_key);
        assert_eq!(accrual(&outcome).offer_id, "SERVICE_POST-77");
        assert_eq!(outcome.warnings.len(), 1);

        let type_only = row(&[("Дата начисления", "2025-01-20"), ("Тип начисления", "Хранение")]);
        let outcome = t.transform(&c, 5, &type_only).unwrap();
        assert_eq!(accrual(&outcome).offer_id, "SERVICE_хранение");
    }

    #[test]
    fn test_storage_fallback_keys() {
        let t = LedgerRowTransformer::new();
        let c = ctx(ImportType::StorageCost, None);

        let outcome = t
            .transform(&c, 1, &row(&[("Дата", "01.03.2025"), ("SKU", "998877")]))
            .unwrap();
        assert_eq!(storage(&outcome).offer_id, "SERVICE_998877");
        assert!(outcome.used_fallback_key);

        let outcome = t.transform(&c, 2, &row(&[("Дата", "01.03.2025")])).unwrap();
        assert_eq!(storage(&outcome).offer_id, STORAGE_FALLBACK_KEY);
    }

    #[test]
    fn test_required_fields_blank() {
        let t = LedgerRowTransformer::new();
        let c = ctx(ImportType::AccrualLedger, None);

        let err = t
            .transform(&c, 3, &row(&[("Тип начисления", "Логистика"), ("Артикул", "A")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "行 3: 必填字段为空: accrual_date");

        let err = t
            .transform(&c, 7, &row(&[("Дата начисления", "20.01.2025"), ("Тип начисления", "  ")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "行 7: 必填字段为空: accrual_type");
    }

    #[test]
    fn test_record_date_uses_period_fallback() {
        let period = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let outcome = LedgerRowTransformer::new()
            .transform(
                &ctx(ImportType::StorageCost, Some(period)),
                9,
                &row(&[("Дата", "не дата"), ("Артикул", "ART-9")]),
            )
            .unwrap();
        assert_eq!(storage(&outcome).cost_date, period);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_storage_integer_fields() {
        let outcome = LedgerRowTransformer::new()
            .transform(
                &ctx(ImportType::StorageCost, None),
                1,
                &row(&[
                    ("Дата", "2025-03-02"),
                    ("Артикул", "ART-1"),
                    ("Кол-во экземпляров", "12 шт"),
                    ("Начисленная стоимость размещения", "3,75"),
                ]),
            )
            .unwrap();
        let r = storage(&outcome);
        assert_eq!(r.instances, 12);
        assert_eq!(r.paid_instances, 0);
        assert_eq!(r.storage_cost_amount, 3.75);
    }

    #[test]
    fn test_round_trip_through_raw_row() {
        let t = LedgerRowTransformer::new();
        let c = ctx(ImportType::AccrualLedger, None);
        let raw = row(&[
            ("Дата начисления", "20.01.2025"),
            ("Тип начисления", "Логистика"),
            ("Артикул", "ART-1"),
            ("Дата принятия заказа в обработку или оказания услуги", "18.01.2025"),
            ("Склад отгрузки", "Хоругвино"),
            ("Логистика", "-63,4"),
        ]);
        let first = t.transform(&c, 2, &raw).unwrap();
        let second = t.transform(&c, 2, &to_raw_row(&first.record)).unwrap();
        assert_eq!(first.record, second.record);
    }

    #[test]
    fn test_required_flag_comes_from_table() {
        let c = ctx(ImportType::StorageCost, None);
        let only_date = row(&[("Дата", "01.03.2025")]);

        let mut offer = *field_spec(ImportType::StorageCost, LedgerField::StorageOfferId).unwrap();
        let date = *field_spec(ImportType::StorageCost, LedgerField::CostDate).unwrap();
        assert!(TypedRow::build(&c, 4, &only_date, &[date, offer]).is_ok());

        offer.required = true;
        let err = TypedRow::build(&c, 4, &only_date, &[date, offer])
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "行 4: 必填字段为空: offer_id");
    }

    #[test]
    fn test_unlisted_field_reads_as_empty() {
        let c = ctx(ImportType::StorageCost, None);
        let raw = row(&[("Дата", "01.03.2025"), ("Кол-во экземпляров", "5")]);
        let date = *field_spec(ImportType::StorageCost, LedgerField::CostDate).unwrap();

        let typed = TypedRow::build(&c, 1, &raw, &[date]).unwrap();
        assert_eq!(typed.integer(LedgerField::Instances), 0);
        assert_eq!(
            typed.date(LedgerField::CostDate),
            NaiveDate::from_ymd_opt(2025, 3, 1)
        );
    }

    #[test]
    fn test_short_year_falls_back_to_period() {
        let period = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let outcome = LedgerRowTransformer::new()
            .transform(
                &ctx(ImportType::StorageCost, Some(period)),
                2,
                &row(&[("Дата", "20.01.25"), ("Артикул", "ART-1")]),
            )
            .unwrap();
        assert_eq!(storage(&outcome).cost_date, period);
        assert_eq!(outcome.warnings.len(), 1);
    }
}
