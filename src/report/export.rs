//! Выгрузка отчёта в плоские CSV-таблицы.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDate};
use itertools::Itertools;

use super::Report;
use crate::backtest::EvaluationRecord;
use crate::constants::{DATE_FORMAT, VALUE_PRECISION};
use crate::series::SalesSeries;
use crate::views::{ViewCategory, ViewKey};

const OVERALL_FILE: &str = "overall_predictions.csv";
const YEARLY_FILE: &str = "yearly_predictions.csv";
const MONTHLY_FILE: &str = "monthly_predictions.csv";
const HISTORICAL_FILE: &str = "historical_data.csv";
const METRICS_FILE: &str = "metrics.csv";
const HISTORICAL_HEADER: [&str; 5] = [
    "date",
    "historical_sales",
    "weekly_avg",
    "monthly_avg",
    "yearly_avg",
];
const METRICS_HEADER: [&str; 8] = [
    "category",
    "key",
    "view",
    "model",
    "mse",
    "mae",
    "train_len",
    "test_len",
];

#[derive(Debug)]
pub enum ExportSource {
    Io(io::Error),
    Csv(csv::Error),
}

impl fmt::Display for ExportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "{err}"),
        }
    }
}

/// Ошибка записи выходного файла; для прогона она фатальна.
#[derive(Debug)]
pub struct ExportError {
    pub path: PathBuf,
    pub source: ExportSource,
}

impl ExportError {
    fn io(path: &Path, err: io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source: ExportSource::Io(err),
        }
    }

    fn csv(path: &Path, err: csv::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source: ExportSource::Csv(err),
        }
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to write {}: {}", self.path.display(), self.source)
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            ExportSource::Io(err) => Some(err),
            ExportSource::Csv(err) => Some(err),
        }
    }
}

/// Пути к записанным таблицам.
#[derive(Clone, Debug)]
pub struct ExportedFiles {
    pub overall: PathBuf,
    pub yearly: PathBuf,
    pub monthly: PathBuf,
    pub historical: PathBuf,
    pub metrics: PathBuf,
}

impl ExportedFiles {
    fn in_dir(dir: &Path) -> Self {
        Self {
            overall: dir.join(OVERALL_FILE),
            yearly: dir.join(YEARLY_FILE),
            monthly: dir.join(MONTHLY_FILE),
            historical: dir.join(HISTORICAL_FILE),
            metrics: dir.join(METRICS_FILE),
        }
    }

    pub fn paths(&self) -> [&Path; 5] {
        [
            &self.overall,
            &self.yearly,
            &self.monthly,
            &self.historical,
            &self.metrics,
        ]
    }

    /// Имена файлов для ссылок на скачивание.
    pub fn file_names(&self) -> Vec<String> {
        self.paths()
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().to_string())
            .collect()
    }
}

/// Создаёт каталог вывода. Вызывается явно до `export_report`.
pub fn prepare_output_dir(dir: &Path) -> Result<(), ExportError> {
    fs::create_dir_all(dir).map_err(|err| ExportError::io(dir, err))
}

/// Пишет все таблицы отчёта в `dir`; каталог должен уже существовать.
pub fn export_report(
    report: &Report,
    sales: &SalesSeries,
    dir: &Path,
) -> Result<ExportedFiles, ExportError> {
    let files = ExportedFiles::in_dir(dir);
    write_overall(report, sales, &files.overall)?;
    write_step_table(
        &files.yearly,
        &step_columns(report, ViewCategory::FutureYearly, |key| key.to_string()),
    )?;
    write_step_table(
        &files.monthly,
        &step_columns(report, ViewCategory::FutureMonthly, |key| {
            format!("Month_{key}")
        }),
    )?;
    write_historical(sales, &files.historical)?;
    write_metrics(report, &files.metrics)?;
    Ok(files)
}

fn format_value(value: f64) -> String {
    format!("{value:.prec$}", prec = VALUE_PRECISION)
}

fn format_cell(value: Option<f64>) -> String {
    value.map(format_value).unwrap_or_default()
}

fn write_table<I, R>(path: &Path, header: Vec<String>, rows: I) -> Result<(), ExportError>
where
    I: IntoIterator<Item = R>,
    R: IntoIterator<Item = String>,
{
    let mut writer = csv::Writer::from_path(path).map_err(|err| ExportError::csv(path, err))?;
    writer
        .write_record(&header)
        .map_err(|err| ExportError::csv(path, err))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|err| ExportError::csv(path, err))?;
    }
    writer.flush().map_err(|err| ExportError::io(path, err))
}

/// Прогнозы по всему ряду: строка на дату прогноза, колонка на модель.
/// Строки датируются днями сразу после конца истории, а не после конца обучающей части.
fn write_overall(report: &Report, sales: &SalesSeries, path: &Path) -> Result<(), ExportError> {
    let empty = EvaluationRecord::default();
    let record = report
        .record(ViewCategory::Overall, ViewKey::Overall)
        .unwrap_or(&empty);
    let forecasts = record.forecasts.values().collect_vec();

    let header = std::iter::once("date".to_string())
        .chain(
            forecasts
                .iter()
                .map(|result| result.model.display_name().to_string()),
        )
        .collect_vec();
    let steps = forecasts
        .iter()
        .map(|result| result.forecast.len())
        .max()
        .unwrap_or(0);
    let dates: Vec<NaiveDate> = match sales.daily.last_date() {
        Some(last) => (1..=steps)
            .map(|step| last + Duration::days(step as i64))
            .collect(),
        None => forecasts
            .first()
            .map(|result| result.forecast.dates())
            .unwrap_or_default(),
    };
    let columns = forecasts
        .iter()
        .map(|result| result.forecast.present_values())
        .collect_vec();

    let rows = dates.iter().enumerate().map(|(idx, date)| {
        std::iter::once(date.format(DATE_FORMAT).to_string())
            .chain(
                columns
                    .iter()
                    .map(|values| format_cell(values.get(idx).copied())),
            )
            .collect_vec()
    });
    write_table(path, header, rows)
}

struct StepColumn {
    header: String,
    values: Vec<f64>,
}

fn step_columns(
    report: &Report,
    category: ViewCategory,
    prefix: impl Fn(ViewKey) -> String,
) -> Vec<StepColumn> {
    report
        .category(category)
        .flat_map(|entry| {
            let prefix = prefix(entry.view.key);
            entry
                .record
                .forecasts
                .values()
                .map(move |result| StepColumn {
                    header: format!("{prefix}_{}", result.model.display_name()),
                    values: result.forecast.present_values(),
                })
        })
        .collect()
}

/// Широкая таблица с колонкой `step` (1..H); короткие колонки дополняются пустыми ячейками.
fn write_step_table(path: &Path, columns: &[StepColumn]) -> Result<(), ExportError> {
    let header = std::iter::once("step".to_string())
        .chain(columns.iter().map(|column| column.header.clone()))
        .collect_vec();
    let steps = columns
        .iter()
        .map(|column| column.values.len())
        .max()
        .unwrap_or(0);
    let rows = (0..steps).map(|idx| {
        std::iter::once((idx + 1).to_string())
            .chain(
                columns
                    .iter()
                    .map(|column| format_cell(column.values.get(idx).copied())),
            )
            .collect_vec()
    });
    write_table(path, header, rows)
}

/// Дневной ряд и средние по неделям, месяцам и годам, протянутые на каждую дату.
fn write_historical(sales: &SalesSeries, path: &Path) -> Result<(), ExportError> {
    let dates = sales.daily.dates();
    let weekly = sales.weekly.forward_fill_onto(&dates);
    let monthly = sales.monthly.forward_fill_onto(&dates);
    let yearly = sales.yearly.forward_fill_onto(&dates);

    let header = HISTORICAL_HEADER.iter().map(ToString::to_string).collect_vec();
    let rows = sales
        .daily
        .observations()
        .iter()
        .enumerate()
        .map(|(idx, point)| {
            vec![
                point.date.format(DATE_FORMAT).to_string(),
                format_cell(point.value),
                format_cell(weekly[idx]),
                format_cell(monthly[idx]),
                format_cell(yearly[idx]),
            ]
        });
    write_table(path, header, rows)
}

/// Строка на каждую модель с прогнозом; неоценённые модели идут с пустыми mse/mae.
fn write_metrics(report: &Report, path: &Path) -> Result<(), ExportError> {
    let header = METRICS_HEADER.iter().map(ToString::to_string).collect_vec();
    let rows = report.entries().flat_map(|entry| {
        let record = &entry.record;
        record.forecasts.keys().map(move |model| {
            let metrics = record.metrics.get(model);
            vec![
                entry.view.category.id().to_string(),
                entry.view.key.to_string(),
                entry.view.name.clone(),
                model.display_name().to_string(),
                format_cell(metrics.map(|m| m.mse)),
                format_cell(metrics.map(|m| m.mae)),
                record.train_len.to_string(),
                record.test_len.to_string(),
            ]
        })
    });
    write_table(path, header, rows)
}
