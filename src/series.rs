//! Загрузка CSV и неизменяемый дневной ряд продаж с пересэмплированием по периодам.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::config::ColumnConfig;
use crate::constants::{DATE_FORMAT, DATETIME_FORMAT};

const MISSING_MARKERS: [&str; 4] = ["", "nan", "NaN", "null"];

#[derive(Clone, Copy, Debug)]
enum DateFormatHint {
    Date,
    DateTime,
    Rfc3339,
}

const DATE_FORMAT_HINTS: [DateFormatHint; 3] = [
    DateFormatHint::Date,
    DateFormatHint::DateTime,
    DateFormatHint::Rfc3339,
];

impl DateFormatHint {
    fn parse(self, raw: &str) -> Option<NaiveDate> {
        match self {
            Self::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT).ok(),
            Self::DateTime => NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
                .ok()
                .map(|dt| dt.date()),
            Self::Rfc3339 => DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive()),
        }
    }
}

#[derive(Debug)]
pub enum SeriesError {
    Csv(csv::Error),
    MissingColumn(String),
    InvalidDate { line: u64, raw: String },
    InvalidValue { line: u64, raw: String },
    DuplicateDate(NaiveDate),
    Unordered { previous: NaiveDate, next: NaiveDate },
    LengthMismatch { dates: usize, values: usize },
}

impl fmt::Display for SeriesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Csv(err) => write!(f, "{err}"),
            Self::MissingColumn(name) => write!(f, "column '{name}' not found in CSV header"),
            Self::InvalidDate { line, raw } => {
                write!(f, "failed to parse date '{raw}' on line {line}")
            }
            Self::InvalidValue { line, raw } => {
                write!(f, "failed to parse value '{raw}' on line {line}")
            }
            Self::DuplicateDate(date) => {
                write!(f, "duplicate date {}", date.format(DATE_FORMAT))
            }
            Self::Unordered { previous, next } => write!(
                f,
                "dates must be increasing: {} follows {}",
                next.format(DATE_FORMAT),
                previous.format(DATE_FORMAT)
            ),
            Self::LengthMismatch { dates, values } => {
                write!(f, "got {dates} dates for {values} values")
            }
        }
    }
}

impl Error for SeriesError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Csv(err) => Some(err),
            _ => None,
        }
    }
}

impl From<csv::Error> for SeriesError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Частота ряда; задаёт метку конца периода при пересэмплировании.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Метка периода: воскресенье недели, последний день месяца или 31 декабря.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        match self {
            Self::Daily => date,
            Self::Weekly => {
                let days_to_sunday = 6 - date.weekday().num_days_from_monday();
                date + Duration::days(i64::from(days_to_sunday))
            }
            Self::Monthly => last_day_of_month(date),
            Self::Yearly => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
        }
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first| first.pred_opt())
        .unwrap_or(date)
}

/// Одна точка ряда; `None` означает пропущенное значение.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// Аккумулятор для усреднения значений внутри одного периода.
#[derive(Default, Clone, Copy)]
struct PeriodAccumulator {
    sum: f64,
    count: u32,
}

impl PeriodAccumulator {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum / f64::from(self.count))
    }
}

/// Упорядоченный по датам ряд без дубликатов. Производные ряды всегда новые значения.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(points: Vec<Observation>) -> Result<Self, SeriesError> {
        for pair in points.windows(2) {
            let (previous, next) = (pair[0].date, pair[1].date);
            if previous == next {
                return Err(SeriesError::DuplicateDate(next));
            }
            if previous > next {
                return Err(SeriesError::Unordered { previous, next });
            }
        }
        Ok(Self { points })
    }

    pub fn from_values(dates: &[NaiveDate], values: &[f64]) -> Result<Self, SeriesError> {
        if dates.len() != values.len() {
            return Err(SeriesError::LengthMismatch {
                dates: dates.len(),
                values: values.len(),
            });
        }
        let points = dates
            .iter()
            .zip(values)
            .map(|(&date, &value)| Observation {
                date,
                value: Some(value),
            })
            .collect();
        Self::new(points)
    }

    /// Дневной ряд, начинающийся со дня после `last_date`.
    pub fn daily_after(last_date: NaiveDate, values: &[f64]) -> Self {
        let points = values
            .iter()
            .enumerate()
            .map(|(idx, &value)| Observation {
                date: last_date + Duration::days(idx as i64 + 1),
                value: Some(value),
            })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.points
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|point| point.date).collect()
    }

    /// Значения без пропусков в исходном порядке.
    pub fn present_values(&self) -> Vec<f64> {
        self.points.iter().filter_map(|point| point.value).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|point| point.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|point| point.date)
    }

    pub fn drop_missing(&self) -> Self {
        self.filter(|point| point.value.is_some())
    }

    pub fn filter_dates(&self, predicate: impl Fn(NaiveDate) -> bool) -> Self {
        self.filter(|point| predicate(point.date))
    }

    fn filter(&self, predicate: impl Fn(&Observation) -> bool) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|point| predicate(point))
                .copied()
                .collect(),
        }
    }

    /// Календарные годы, встречающиеся в ряду, по возрастанию.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.points.iter().map(|point| point.date.year()).collect();
        years.dedup();
        years
    }

    pub fn max_year(&self) -> Option<i32> {
        self.last_date().map(|date| date.year())
    }

    /// Делит ряд на `[..idx]` и `[idx..]`; индекс за концом даёт пустой хвост.
    pub fn split_at(&self, idx: usize) -> (Self, Self) {
        let idx = idx.min(self.points.len());
        let (head, tail) = self.points.split_at(idx);
        (
            Self {
                points: head.to_vec(),
            },
            Self {
                points: tail.to_vec(),
            },
        )
    }

    /// Средние по периодам с меткой конца периода; пустые периоды пропускаются.
    pub fn resample_mean(&self, frequency: Frequency) -> Self {
        let buckets = self.points.iter().fold(
            BTreeMap::<NaiveDate, PeriodAccumulator>::new(),
            |mut acc, point| {
                let bucket = acc.entry(frequency.period_end(point.date)).or_default();
                if let Some(value) = point.value {
                    bucket.add(value);
                }
                acc
            },
        );
        let points = buckets
            .into_iter()
            .filter_map(|(date, bucket)| {
                bucket.mean().map(|mean| Observation {
                    date,
                    value: Some(mean),
                })
            })
            .collect();
        Self { points }
    }

    /// Протягивает последнее известное значение на каждую дату из `dates`.
    /// Даты до первой метки получают первое известное значение.
    pub fn forward_fill_onto(&self, dates: &[NaiveDate]) -> Vec<Option<f64>> {
        let known: Vec<(NaiveDate, f64)> = self
            .points
            .iter()
            .filter_map(|point| point.value.map(|value| (point.date, value)))
            .collect();
        let Some(&(_, first_value)) = known.first() else {
            return vec![None; dates.len()];
        };
        dates
            .iter()
            .map(|date| {
                let upto = known.partition_point(|(label, _)| label <= date);
                Some(if upto == 0 {
                    first_value
                } else {
                    known[upto - 1].1
                })
            })
            .collect()
    }
}

/// Дневной ряд и его недельные, месячные и годовые средние.
#[derive(Clone, Debug)]
pub struct SalesSeries {
    pub daily: TimeSeries,
    pub weekly: TimeSeries,
    pub monthly: TimeSeries,
    pub yearly: TimeSeries,
}

impl SalesSeries {
    pub fn new(daily: TimeSeries) -> Self {
        let weekly = daily.resample_mean(Frequency::Weekly);
        let monthly = daily.resample_mean(Frequency::Monthly);
        let yearly = daily.resample_mean(Frequency::Yearly);
        Self {
            daily,
            weekly,
            monthly,
            yearly,
        }
    }
}

/// Читает CSV с колонками даты и продаж, сортирует по дате и отбрасывает дубликаты ошибкой.
pub fn load_sales_series(
    csv_path: &Path,
    columns: &ColumnConfig,
) -> Result<TimeSeries, SeriesError> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let headers = reader.headers()?.clone();
    let column_index = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim() == name)
            .ok_or_else(|| SeriesError::MissingColumn(name.to_string()))
    };
    let date_idx = column_index(&columns.date)?;
    let sales_idx = column_index(&columns.sales)?;

    let mut hint = None;
    let mut points = reader
        .records()
        .map(|record| {
            let record = record?;
            let line = record.position().map_or(0, csv::Position::line);
            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = parse_date_with_hint(raw_date, &mut hint).ok_or_else(|| {
                SeriesError::InvalidDate {
                    line,
                    raw: raw_date.to_string(),
                }
            })?;
            let raw_value = record.get(sales_idx).unwrap_or_default();
            let value = parse_value(raw_value).map_err(|()| SeriesError::InvalidValue {
                line,
                raw: raw_value.to_string(),
            })?;
            Ok(Observation { date, value })
        })
        .collect::<Result<Vec<_>, SeriesError>>()?;

    points.sort_by_key(|point| point.date);
    TimeSeries::new(points)
}

fn parse_date_with_hint(raw: &str, hint: &mut Option<DateFormatHint>) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Some(cached) = *hint
        && let Some(parsed) = cached.parse(trimmed)
    {
        return Some(parsed);
    }

    DATE_FORMAT_HINTS.into_iter().find_map(|candidate| {
        candidate.parse(trimmed).map(|parsed| {
            *hint = Some(candidate);
            parsed
        })
    })
}

fn parse_value(raw: &str) -> Result<Option<f64>, ()> {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return Ok(None);
    }
    let value = trimmed.parse::<f64>().map_err(|_| ())?;
    Ok(value.is_finite().then_some(value))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily(start: NaiveDate, values: &[Option<f64>]) -> TimeSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(idx, &value)| Observation {
                date: start + Duration::days(idx as i64),
                value,
            })
            .collect();
        TimeSeries::new(points).unwrap()
    }

    #[test]
    fn rejects_duplicate_and_unordered_dates() {
        let a = Observation {
            date: date(2020, 1, 2),
            value: Some(1.0),
        };
        let b = Observation {
            date: date(2020, 1, 1),
            value: Some(2.0),
        };
        assert!(matches!(
            TimeSeries::new(vec![a, a]),
            Err(SeriesError::DuplicateDate(_))
        ));
        assert!(matches!(
            TimeSeries::new(vec![a, b]),
            Err(SeriesError::Unordered { .. })
        ));
    }

    #[test]
    fn weekly_labels_end_on_sunday() {
        // 2010-01-01 пятница.
        let series = daily(date(2010, 1, 1), &[Some(1.0), Some(3.0), Some(5.0), Some(7.0)]);
        let weekly = series.resample_mean(Frequency::Weekly);
        let points = weekly.observations();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, date(2010, 1, 3));
        assert_eq!(points[0].value, Some(3.0));
        assert_eq!(points[1].date, date(2010, 1, 10));
        assert_eq!(points[1].value, Some(7.0));
    }

    #[test]
    fn monthly_and_yearly_labels_use_period_end() {
        assert_eq!(Frequency::Monthly.period_end(date(2024, 2, 10)), date(2024, 2, 29));
        assert_eq!(Frequency::Monthly.period_end(date(2023, 12, 1)), date(2023, 12, 31));
        assert_eq!(Frequency::Yearly.period_end(date(2023, 6, 1)), date(2023, 12, 31));
    }

    #[test]
    fn resample_skips_periods_without_values() {
        let points = vec![
            Observation {
                date: date(2020, 1, 15),
                value: Some(10.0),
            },
            Observation {
                date: date(2020, 2, 15),
                value: None,
            },
            Observation {
                date: date(2020, 4, 1),
                value: Some(20.0),
            },
        ];
        let monthly = TimeSeries::new(points)
            .unwrap()
            .resample_mean(Frequency::Monthly);
        assert_eq!(monthly.dates(), vec![date(2020, 1, 31), date(2020, 4, 30)]);
    }

    #[test]
    fn forward_fill_leaves_no_empty_cells() {
        let series = daily(date(2010, 1, 1), &[Some(2.0); 20]);
        let weekly = series.resample_mean(Frequency::Weekly);
        let filled = weekly.forward_fill_onto(&series.dates());
        assert_eq!(filled.len(), series.len());
        assert!(filled.iter().all(Option::is_some));
    }

    #[test]
    fn forward_fill_carries_previous_label() {
        let labels = TimeSeries::from_values(&[date(2020, 1, 5), date(2020, 1, 12)], &[1.0, 2.0])
            .unwrap();
        let filled = labels.forward_fill_onto(&[
            date(2020, 1, 4),
            date(2020, 1, 5),
            date(2020, 1, 11),
            date(2020, 1, 13),
        ]);
        assert_eq!(filled, vec![Some(1.0), Some(1.0), Some(1.0), Some(2.0)]);
    }

    #[test]
    fn split_at_partitions_points() {
        let series = daily(date(2020, 1, 1), &[Some(1.0); 10]);
        let (train, test) = series.split_at(8);
        assert_eq!(train.len() + test.len(), 10);
        assert_eq!(test.first_date(), Some(date(2020, 1, 9)));
    }

    #[test]
    fn loads_csv_with_missing_cells_and_sorts() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,Day_of_Week,Sales").unwrap();
        writeln!(file, "2020-01-02,Thursday,").unwrap();
        writeln!(file, "2020-01-01,Wednesday,100").unwrap();
        writeln!(file, "2020-01-03,Friday,120.5").unwrap();

        let series = load_sales_series(file.path(), &ColumnConfig::default()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.first_date(), Some(date(2020, 1, 1)));
        assert_eq!(series.observations()[1].value, None);
        assert_eq!(series.present_values(), vec![100.0, 120.5]);
    }

    #[test]
    fn load_rejects_duplicate_dates() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,Sales").unwrap();
        writeln!(file, "2020-01-01,1").unwrap();
        writeln!(file, "2020-01-01,2").unwrap();

        let err = load_sales_series(file.path(), &ColumnConfig::default()).unwrap_err();
        assert!(matches!(err, SeriesError::DuplicateDate(_)));
    }

    #[test]
    fn load_reports_missing_column() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "day,amount").unwrap();
        writeln!(file, "2020-01-01,1").unwrap();

        let err = load_sales_series(file.path(), &ColumnConfig::default()).unwrap_err();
        assert!(matches!(err, SeriesError::MissingColumn(name) if name == "Date"));
    }
}
