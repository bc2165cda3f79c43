// ==========================================
// 账单导入管道 - 表头归一化
// ==========================================
// 职责: 表头清洗与诊断（缺失列 / 多余列 / 模板顺序）
// 说明: 仅用于诊断；字段取值走固定映射表，不做模糊匹配
// ==========================================

use crate::domain::types::ImportType;
use crate::importer::value_coercion::is_invisible;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ==========================================
// 模板列（顺序固定）
// ==========================================

pub const ACCRUAL_TEMPLATE: [&str; 25] = [
    "Дата начисления",
    "Тип начисления",
    "Номер отправления или идентификатор услуги",
    "Дата принятия заказа в обработку или оказания услуги",
    "Склад отгрузки",
    "SKU",
    "Артикул",
    "Название товара или услуги",
    "Количество",
    "За продажу или возврат до вычета комиссий и услуг",
    "Вознаграждение Ozon, %",
    "Вознаграждение Ozon",
    "Сборка заказа",
    "Обработка отправления (Drop-off/Pick-up) (разбивается по товарам пропорционально количеству в отправлении)",
    "Магистраль",
    "Последняя миля (разбивается по товарам пропорционально доле цены товара в сумме отправления)",
    "Обратная магистраль",
    "Обработка возврата",
    "Обработка отмененного или невостребованного товара (разбивается по товарам в отправлении в одинаковой пропорции)",
    "Обработка невыкупленного товара",
    "Логистика",
    "Индекс локализации",
    "Среднее время доставки, часы",
    "Обратная логистика",
    "Итого, руб.",
];

pub const STORAGE_TEMPLATE: [&str; 12] = [
    "Дата",
    "SKU",
    "Артикул",
    "Категория товара",
    "Описательный тип",
    "Склад",
    "Признак товара",
    "Суммарный объем в миллилитрах",
    "Кол-во экземпляров",
    "Платный объем в миллилитрах",
    "Кол-во платных экземпляров",
    "Начисленная стоимость размещения",
];

/// 导入类型对应的模板列
pub fn template_columns(import_type: ImportType) -> &'static [&'static str] {
    match import_type {
        ImportType::AccrualLedger => &ACCRUAL_TEMPLATE,
        ImportType::StorageCost => &STORAGE_TEMPLATE,
    }
}

// ==========================================
// 归一化函数
// ==========================================

/// 修复 UTF-16 错位：ASCII 字符被读进了高字节（如 "䄀爀琀"）
///
/// 当 ≥60% 的字符呈 0xXX00 形态时，整体还原为 ASCII
pub fn fix_weird_utf16(s: &str) -> String {
    let codes: Vec<u32> = s.chars().map(|c| c as u32).collect();
    if codes.is_empty() {
        return String::new();
    }

    let shifted = |c: u32| -> Option<u32> {
        let low = c & 0xff;
        let high = c >> 8;
        if c <= 0xffff && low == 0 && (0x20..=0x7e).contains(&high) {
            Some(high)
        } else {
            None
        }
    };

    let shifted_count = codes.iter().filter(|c| shifted(**c).is_some()).count();
    let threshold = ((codes.len() as f64 * 0.6).round() as usize).max(1);
    if shifted_count < threshold {
        return s.to_string();
    }

    codes
        .iter()
        .map(|c| {
            let code = shifted(*c).unwrap_or(*c);
            char::from_u32(code).unwrap_or('\u{FFFD}')
        })
        .collect()
}

/// 清洗表头（去不可见字符 + TRIM，保留大小写）；解析器写入 RawRow 的列名
pub fn clean_header(s: &str) -> String {
    fix_weird_utf16(s)
        .chars()
        .filter(|c| !is_invisible(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// 归一化表头（诊断口径）：清洗 + 小写 + 空白折叠
pub fn normalize_header(s: &str) -> String {
    clean_header(s)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 归一化后与模板列一致时返回模板原文，否则返回清洗后的表头
pub fn canonical_header(import_type: ImportType, raw: &str) -> String {
    let norm = normalize_header(raw);
    template_columns(import_type)
        .iter()
        .find(|t| normalize_header(t) == norm)
        .map(|t| t.to_string())
        .unwrap_or_else(|| clean_header(raw))
}

// ==========================================
// HeaderReport - 表头诊断结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderReport {
    /// 模板中有、文件中缺失的列（模板原文）
    pub missing: Vec<String>,
    /// 文件中有、模板中没有的列（文件原文）
    pub unexpected: Vec<String>,
    /// 列数与顺序是否与模板逐一一致
    pub exact_match: bool,
}

impl HeaderReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }

    /// 转为提示信息
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !self.missing.is_empty() {
            warnings.push(format!("缺少列: {}", self.missing.join(", ")));
        }
        if !self.unexpected.is_empty() {
            warnings.push(format!("未知列已忽略: {}", self.unexpected.join(", ")));
        }
        if self.is_clean() && !self.exact_match {
            warnings.push("列顺序与模板不一致".to_string());
        }
        warnings
    }
}

/// 按归一化口径比对文件表头与模板
pub fn diagnose_headers<S: AsRef<str>>(import_type: ImportType, headers: &[S]) -> HeaderReport {
    let template = template_columns(import_type);

    let file_norm: Vec<String> = headers
        .iter()
        .map(|h| normalize_header(h.as_ref()))
        .filter(|h| !h.is_empty())
        .collect();
    let file_set: HashSet<&str> = file_norm.iter().map(|s| s.as_str()).collect();

    let template_norm: Vec<String> = template.iter().map(|h| normalize_header(h)).collect();
    let template_set: HashSet<&str> = template_norm.iter().map(|s| s.as_str()).collect();

    let missing = template
        .iter()
        .zip(template_norm.iter())
        .filter(|(_, norm)| !file_set.contains(norm.as_str()))
        .map(|(orig, _)| orig.to_string())
        .collect();

    let unexpected = headers
        .iter()
        .map(|h| h.as_ref())
        .filter(|h| {
            let norm = normalize_header(h);
            !norm.is_empty() && !template_set.contains(norm.as_str())
        })
        .map(|h| h.to_string())
        .collect();

    HeaderReport {
        missing,
        unexpected,
        exact_match: file_norm == template_norm,
    }
}
