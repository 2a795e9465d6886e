//! Общие константы форматирования, чтобы не дублировать строки и имена колонок.

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const VALUE_PRECISION: usize = 6;
pub const DEFAULT_DATE_COLUMN: &str = "Date";
pub const DEFAULT_SALES_COLUMN: &str = "Sales";
