// ==========================================
// 账单导入管道 - 去重器实现
// ==========================================
// 职责: 同一冲突键的多条记录折叠为一条（last-wins）
// 说明: 目标表 upsert 遇到同键两行会整批失败，去重是写入前提
// ==========================================

use crate::domain::ledger::{CanonicalRecord, DedupKey};
use crate::importer::ledger_importer_trait::Deduplicator as DeduplicatorTrait;
use std::collections::HashMap;

/// 去重结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    pub records: Vec<CanonicalRecord>,
    /// 被折叠丢弃的记录: (行号, 去重键)
    pub dropped: Vec<(usize, DedupKey)>,
}

impl DedupOutcome {
    pub fn dropped_count(&self) -> usize {
        self.dropped.len()
    }
}

pub struct KeyDeduplicator;

impl DeduplicatorTrait for KeyDeduplicator {
    /// 同键保留 row_index 最大的记录
    ///
    /// 保留记录按首次出现的位置输出，便于与源文件顺序对照
    fn dedup(&self, records: Vec<CanonicalRecord>) -> DedupOutcome {
        let mut slot_by_key: HashMap<DedupKey, usize> = HashMap::new();
        let mut slots: Vec<CanonicalRecord> = Vec::with_capacity(records.len());
        let mut dropped = Vec::new();

        for record in records {
            let key = record.dedup_key();
            match slot_by_key.get(&key) {
                Some(&slot) => {
                    let kept = &mut slots[slot];
                    if record.row_index() >= kept.row_index() {
                        dropped.push((kept.row_index(), key));
                        *kept = record;
                    } else {
                        dropped.push((record.row_index(), key));
                    }
                }
                None => {
                    slot_by_key.insert(key, slots.len());
                    slots.push(record);
                }
            }
        }

        DedupOutcome {
            records: slots,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::StorageCostRecord;
    use chrono::NaiveDate;

    fn storage(offer: &str, amount: f64, row_index: usize) -> CanonicalRecord {
        CanonicalRecord::StorageCost(StorageCostRecord {
            marketplace_id: "mp-1".to_string(),
            cost_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            offer_id: offer.to_string(),
            sku: None,
            category: None,
            descriptive_type: None,
            warehouse: None,
            item_flag: None,
            total_volume_ml: 0.0,
            instances: 0,
            paid_volume_ml: 0.0,
            paid_instances: 0,
            storage_cost_amount: amount,
            import_batch_id: "run-1".to_string(),
            row_index,
        })
    }

    fn amount(record: &CanonicalRecord) -> f64 {
        match record {
            CanonicalRecord::StorageCost(r) => r.storage_cost_amount,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_last_wins() {
        let outcome = KeyDeduplicator.dedup(vec![
            storage("A", 1.0, 1),
            storage("B", 2.0, 2),
            storage("A", 3.0, 3),
        ]);

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0].offer_id(), "A");
        assert_eq!(amount(&outcome.records[0]), 3.0);
        assert_eq!(outcome.records[1].offer_id(), "B");
        assert_eq!(outcome.dropped_count(), 1);
        assert_eq!(outcome.dropped[0].0, 1);
    }

    #[test]
    fn test_out_of_order_row_index() {
        // 行号更大的记录先出现时仍以其为准
        let outcome = KeyDeduplicator.dedup(vec![storage("A", 9.0, 5), storage("A", 1.0, 2)]);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].row_index(), 5);
        assert_eq!(outcome.dropped[0].0, 2);
    }

    #[test]
    fn test_empty_input() {
        let outcome = KeyDeduplicator.dedup(Vec::new());
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.dropped_count(), 0);
    }
}
