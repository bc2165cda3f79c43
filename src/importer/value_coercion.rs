// ==========================================
// 账单导入管道 - 值类型转换
// ==========================================
// 职责: 文本清洗 / 数值转换 / 日期转换
// 红线: 数值转换从不报错（无法解析 → 0）
// ==========================================

use crate::domain::ledger::CellValue;
use chrono::{Duration, NaiveDate};
use std::ops::RangeInclusive;

/// 是否为不可见字符（BOM / 零宽 / 控制字符）
pub fn is_invisible(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{001F}'
        | '\u{007F}'..='\u{009F}'
        | '\u{200B}'..='\u{200F}'
        | '\u{FEFF}')
}

/// 去除不可见字符并 TRIM（保留大小写）
pub fn strip_invisible(value: &str) -> String {
    value
        .chars()
        .filter(|c| !is_invisible(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// 清洗文本单元格；空白 → None
pub fn clean_text(cell: Option<&CellValue>) -> Option<String> {
    let raw = match cell? {
        CellValue::Empty => return None,
        CellValue::Text(s) => s.clone(),
        CellValue::Number(n) => format_number(*n),
        CellValue::Bool(b) => b.to_string(),
    };
    let cleaned = strip_invisible(&raw);
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// 归一化文本（分析口径）：清洗 + 小写 + 空白折叠
pub fn normalize_for_analytics(value: &str) -> String {
    strip_invisible(value)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// 整数值的数字不带小数点输出（SKU 等编码常被 Excel 存成数字）
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// ==========================================
// 数值转换
// ==========================================

/// 解析数值；空白或无法解析 → 0
///
/// 规则:
/// - 去除空白 / 不换行空格 / 零宽字符
/// - 各类减号（− – —）统一为 '-'
/// - 第一个逗号视为小数点
/// - 取最长合法数值前缀（"12.5 руб" → 12.5）
pub fn parse_number(cell: Option<&CellValue>) -> f64 {
    match cell {
        None | Some(CellValue::Empty) => 0.0,
        Some(CellValue::Number(n)) if n.is_finite() => *n,
        Some(CellValue::Number(_)) => 0.0,
        Some(CellValue::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(CellValue::Text(s)) => parse_number_str(s),
    }
}

pub fn parse_number_str(raw: &str) -> f64 {
    let normalized: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{00A0}' && !is_invisible(*c))
        .map(|c| match c {
            '\u{2212}' | '\u{2013}' | '\u{2014}' => '-',
            other => other,
        })
        .collect::<String>()
        .replacen(',', ".", 1);

    let prefix = numeric_prefix(&normalized);
    prefix
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// 提取最长的合法浮点数前缀：[+-]?digits[.digits][e[+-]digits]
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut i = 0;

    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut has_digits = i > int_start;
    if has_digits {
        end = i;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i > frac_start {
            has_digits = true;
            end = i;
        }
    }
    if has_digits && i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }

    &s[..end]
}

/// 解析整数（件数类字段）：只保留数字，空 → 0
pub fn parse_integer(cell: Option<&CellValue>) -> i64 {
    match cell {
        None | Some(CellValue::Empty) | Some(CellValue::Bool(_)) => 0,
        Some(CellValue::Number(n)) if n.is_finite() => n.trunc() as i64,
        Some(CellValue::Number(_)) => 0,
        Some(CellValue::Text(s)) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<i64>().unwrap_or(0)
        }
    }
}

// ==========================================
// 日期转换
// ==========================================

/// 解析日期；失败时使用 fallback（账期日期），否则 None
///
/// 支持:
/// - 数值单元格: Excel 日期序列号（纪元 1899-12-30）
/// - DD.MM.YYYY[ HH:MM[:SS]]
/// - YYYY-MM-DD[ HH:MM[:SS]] / RFC 3339
///
/// 年份必须为 4 位；纯数字文本不按序列号处理
pub fn parse_date(cell: Option<&CellValue>, fallback: Option<NaiveDate>) -> Option<NaiveDate> {
    let parsed = match cell {
        None | Some(CellValue::Empty) | Some(CellValue::Bool(_)) => None,
        Some(CellValue::Number(n)) => excel_serial_to_date(*n),
        Some(CellValue::Text(s)) => parse_date_str(s),
    };
    parsed.or(fallback)
}

pub fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    let s = strip_invisible(raw);

    // 日期部分与时间部分以空白或 'T' 分隔
    let date_part = s.split(&[' ', 'T'][..]).next().unwrap_or("");
    let parts: Vec<&str> = date_part.split(&['.', '-'][..]).collect();

    match parts.as_slice() {
        [d, m, y]
            if date_part.contains('.')
                && is_digits(d, 1..=2)
                && is_digits(m, 1..=2)
                && is_digits(y, 4..=4) =>
        {
            NaiveDate::parse_from_str(date_part, "%d.%m.%Y").ok()
        }
        [y, m, d]
            if date_part.contains('-')
                && is_digits(y, 4..=4)
                && is_digits(m, 2..=2)
                && is_digits(d, 2..=2) =>
        {
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
        }
        _ => None,
    }
}

fn is_digits(s: &str, len: RangeInclusive<usize>) -> bool {
    len.contains(&s.len()) && s.chars().all(|c| c.is_ascii_digit())
}

/// Excel 序列号 → 日期（只取整数部分）
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > 2_958_465.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
