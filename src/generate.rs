//! Синтетический дневной ряд продаж: тренд, сезонность по месяцам, будни/выходные,
//! праздники и мультипликативный шум.

use std::error::Error;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate, Weekday};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::constants::{DATE_FORMAT, DEFAULT_DATE_COLUMN, DEFAULT_SALES_COLUMN};

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_START: &str = "2010-01-01";
pub const DEFAULT_END: &str = "2024-12-31";

const BASE_LEVEL: f64 = 300.0;
const YEARLY_GROWTH: f64 = 10.0;
/// Коэффициенты по месяцам, январь..декабрь.
const MONTH_FACTORS: [f64; 12] = [1.2, 1.1, 1.3, 0.9, 0.8, 0.7, 0.9, 1.0, 1.1, 1.4, 1.5, 1.6];
const WEEKDAY_FACTOR: f64 = 1.2;
const WEEKEND_FACTOR: f64 = 0.7;
const HOLIDAY_FACTOR: f64 = 1.5;
/// Фиксированные государственные праздники (месяц, день).
const HOLIDAYS: [(u32, u32); 3] = [(1, 26), (8, 15), (10, 2)];
const NOISE_MEAN: f64 = 1.0;
const NOISE_STD: f64 = 0.1;
const MIN_SALES: i64 = 100;
const MAX_SALES: i64 = 1000;
const HEADER: [&str; 4] = [
    DEFAULT_DATE_COLUMN,
    "Day_of_Week",
    "Holiday_Indicator",
    DEFAULT_SALES_COLUMN,
];

#[derive(Clone, Copy, Debug)]
pub struct GeneratorConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub seed: u64,
}

/// Одна строка синтетического набора.
#[derive(Clone, Debug, PartialEq)]
pub struct SalesRow {
    pub date: NaiveDate,
    pub holiday: bool,
    pub sales: i64,
}

fn is_holiday(date: NaiveDate) -> bool {
    HOLIDAYS.contains(&(date.month(), date.day()))
}

const fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Генерирует строки за `[start, end]`; один и тот же seed даёт один и тот же ряд.
pub fn generate_rows(config: &GeneratorConfig) -> Result<Vec<SalesRow>, String> {
    if config.end < config.start {
        return Err(format!(
            "End date {} is before start date {}",
            config.end, config.start
        ));
    }
    let noise = Normal::new(NOISE_MEAN, NOISE_STD).map_err(|err| err.to_string())?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let start_year = config.start.year();

    let rows = config
        .start
        .iter_days()
        .take_while(|date| *date <= config.end)
        .map(|date| {
            let trend = f64::from(date.year() - start_year).mul_add(YEARLY_GROWTH, BASE_LEVEL);
            let month_factor = MONTH_FACTORS[date.month0() as usize];
            let weekday_factor = if is_weekend(date.weekday()) {
                WEEKEND_FACTOR
            } else {
                WEEKDAY_FACTOR
            };
            let holiday = is_holiday(date);
            let holiday_factor = if holiday { HOLIDAY_FACTOR } else { 1.0 };
            let raw = trend * month_factor * weekday_factor * holiday_factor * noise.sample(&mut rng);
            SalesRow {
                date,
                holiday,
                sales: (raw.trunc() as i64).clamp(MIN_SALES, MAX_SALES),
            }
        })
        .collect();
    Ok(rows)
}

pub fn write_rows(rows: &[SalesRow], output_csv: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = output_csv.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(output_csv)?;
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record([
            row.date.format(DATE_FORMAT).to_string(),
            weekday_name(row.date.weekday()).to_string(),
            u8::from(row.holiday).to_string(),
            row.sales.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::config::ColumnConfig;
    use crate::series::load_sales_series;

    fn config(seed: u64) -> GeneratorConfig {
        GeneratorConfig {
            start: NaiveDate::from_ymd_opt(2019, 12, 25).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            seed,
        }
    }

    #[test]
    fn same_seed_gives_same_rows() {
        let first = generate_rows(&config(DEFAULT_SEED)).unwrap();
        let second = generate_rows(&config(DEFAULT_SEED)).unwrap();
        let other = generate_rows(&config(7)).unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn rows_cover_range_within_bounds() {
        let rows = generate_rows(&config(DEFAULT_SEED)).unwrap();
        assert_eq!(rows.len(), 7 + 366 + 31 + 28 + 1);
        assert_eq!(rows.first().map(|row| row.date), Some(config(1).start));
        assert_eq!(rows.last().map(|row| row.date), Some(config(1).end));
        assert!(
            rows.iter()
                .all(|row| (MIN_SALES..=MAX_SALES).contains(&row.sales))
        );
        let holidays: Vec<_> = rows
            .iter()
            .filter(|row| row.holiday)
            .map(|row| row.date.format(DATE_FORMAT).to_string())
            .collect();
        assert_eq!(
            holidays,
            vec!["2020-01-26", "2020-08-15", "2020-10-02", "2021-01-26"]
        );
    }

    #[test]
    fn reversed_range_is_rejected() {
        let cfg = GeneratorConfig {
            start: NaiveDate::from_ymd_opt(2021, 1, 2).unwrap(),
            end: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            seed: DEFAULT_SEED,
        };
        assert!(generate_rows(&cfg).is_err());
    }

    #[test]
    fn written_csv_loads_back_as_sales_series() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("sales.csv");
        let rows = generate_rows(&config(DEFAULT_SEED)).unwrap();
        write_rows(&rows, &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("Date,Day_of_Week,Holiday_Indicator,Sales\n2019-12-25,Wednesday,0,"));

        let series = load_sales_series(&path, &ColumnConfig::default()).unwrap();
        assert_eq!(series.len(), rows.len());
        assert_eq!(series.present_values()[0], rows[0].sales as f64);
    }
}
