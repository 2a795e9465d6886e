//! TOML-конфигурация прогона: доля обучения, горизонты, набор моделей и имена колонок.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::backtest::BacktestSettings;
use crate::constants::{DEFAULT_DATE_COLUMN, DEFAULT_SALES_COLUMN};
use crate::model::{ModelKind, ModelSettings};
use crate::views::HorizonSettings;

pub const DEFAULT_MODEL_CONFIG: &str = "config/model.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    backtest: Option<BacktestFile>,
    horizons: Option<HorizonsFile>,
    models: Option<ModelsFile>,
    simple_smoothing: Option<SimpleSmoothingFile>,
    arima: Option<ArimaFile>,
    columns: Option<ColumnsFile>,
}

#[derive(Debug, Deserialize)]
struct BacktestFile {
    train_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct HorizonsFile {
    overall: Option<usize>,
    year: Option<usize>,
    month: Option<usize>,
    future_year: Option<usize>,
    future_month: Option<usize>,
    future_years: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ModelsFile {
    enabled: Option<Vec<String>>,
    max_iters: Option<u64>,
    report_failures: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SimpleSmoothingFile {
    #[serde(alias = "smoothing_level")]
    alpha: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ArimaFile {
    #[serde(alias = "p")]
    ar_order: Option<usize>,
    #[serde(alias = "d")]
    differencing: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ColumnsFile {
    date: Option<String>,
    sales: Option<String>,
}

/// Имена колонок входного CSV.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnConfig {
    pub date: String,
    pub sales: String,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            date: DEFAULT_DATE_COLUMN.to_string(),
            sales: DEFAULT_SALES_COLUMN.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RunConfig {
    pub backtest: BacktestSettings,
    pub horizons: HorizonSettings,
    pub columns: ColumnConfig,
}

fn resolve_config(file: ConfigFile) -> Result<RunConfig, String> {
    let mut cfg = RunConfig::default();

    if let Some(backtest) = file.backtest
        && let Some(train_ratio) = backtest.train_ratio
    {
        cfg.backtest.train_ratio = train_ratio;
    }

    if let Some(horizons) = file.horizons {
        let target = &mut cfg.horizons;
        if let Some(value) = horizons.overall {
            target.overall = value;
        }
        if let Some(value) = horizons.year {
            target.year = value;
        }
        if let Some(value) = horizons.month {
            target.month = value;
        }
        if let Some(value) = horizons.future_year {
            target.future_year = value;
        }
        if let Some(value) = horizons.future_month {
            target.future_month = value;
        }
        if let Some(value) = horizons.future_years {
            target.future_years = value;
        }
    }

    if let Some(models) = file.models {
        if let Some(enabled) = models.enabled {
            cfg.backtest.models = enabled
                .iter()
                .map(|name| {
                    ModelKind::from_id(name).ok_or_else(|| format!("Unknown model name: {name}"))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(max_iters) = models.max_iters {
            cfg.backtest.model.max_iters = max_iters;
        }
        if let Some(report_failures) = models.report_failures {
            cfg.backtest.report_failures = report_failures;
        }
    }

    if let Some(simple) = file.simple_smoothing {
        cfg.backtest.model.smoothing_level = simple.alpha;
    }

    if let Some(arima) = file.arima {
        if let Some(ar_order) = arima.ar_order {
            cfg.backtest.model.ar_order = ar_order;
        }
        if let Some(differencing) = arima.differencing {
            cfg.backtest.model.differencing = differencing;
        }
    }

    if let Some(columns) = file.columns {
        if let Some(date) = columns.date {
            cfg.columns.date = date;
        }
        if let Some(sales) = columns.sales {
            cfg.columns.sales = sales;
        }
    }

    Ok(cfg)
}

fn validate_config(cfg: &RunConfig) -> Result<(), String> {
    let ratio = cfg.backtest.train_ratio;
    if !ratio.is_finite() || ratio <= 0.0 || ratio >= 1.0 {
        return Err("backtest.train_ratio must be within (0, 1)".to_string());
    }
    let horizons = &cfg.horizons;
    for (name, value) in [
        ("overall", horizons.overall),
        ("year", horizons.year),
        ("month", horizons.month),
        ("future_year", horizons.future_year),
        ("future_month", horizons.future_month),
    ] {
        if value == 0 {
            return Err(format!("horizons.{name} must be > 0"));
        }
    }
    if cfg.backtest.models.is_empty() {
        return Err("models.enabled must list at least one model".to_string());
    }
    if cfg.backtest.model.max_iters == 0 {
        return Err("models.max_iters must be > 0".to_string());
    }
    if let Some(alpha) = cfg.backtest.model.smoothing_level
        && (!alpha.is_finite() || alpha <= 0.0 || alpha > 1.0)
    {
        return Err("simple_smoothing.alpha must be within (0, 1]".to_string());
    }
    if cfg.backtest.model.ar_order == 0 {
        return Err("arima.ar_order must be > 0".to_string());
    }
    if cfg.columns.date.trim().is_empty() || cfg.columns.sales.trim().is_empty() {
        return Err("columns.date and columns.sales must not be empty".to_string());
    }
    Ok(())
}

pub fn parse_config(raw: &str) -> Result<RunConfig, String> {
    let file: ConfigFile = toml::from_str(raw).map_err(|err| err.to_string())?;
    let cfg = resolve_config(file)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Читает конфигурацию; отсутствие файла по умолчанию означает встроенные значения.
pub fn load_run_config(path: &Path) -> Result<RunConfig, String> {
    if !path.exists() {
        if path == Path::new(DEFAULT_MODEL_CONFIG) {
            tracing::info!(
                "Model config {} not found, using built-in defaults",
                path.display()
            );
            return Ok(RunConfig::default());
        }
        return Err(format!("Model config {} does not exist", path.display()));
    }

    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read model config {}: {err}", path.display()))?;
    parse_config(&raw).map_err(|err| format!("Invalid model config {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = parse_config("").unwrap();
        assert!((cfg.backtest.train_ratio - 0.8).abs() < f64::EPSILON);
        assert_eq!(cfg.horizons.overall, 365);
        assert_eq!(cfg.horizons.year, 52);
        assert_eq!(cfg.horizons.month, 30);
        assert_eq!(cfg.horizons.future_years, 3);
        assert_eq!(cfg.backtest.models, ModelKind::ALL.to_vec());
        assert_eq!(cfg.backtest.model.ar_order, 5);
        assert_eq!(cfg.backtest.model.differencing, 1);
        assert_eq!(cfg.columns, ColumnConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = parse_config(
            r#"
            [backtest]
            train_ratio = 0.75

            [horizons]
            month = 14
            future_years = 2

            [models]
            enabled = ["simple_smoothing", "ARIMA"]
            report_failures = false

            [simple_smoothing]
            alpha = 0.3

            [columns]
            sales = "Revenue"
            "#,
        )
        .unwrap();
        assert!((cfg.backtest.train_ratio - 0.75).abs() < f64::EPSILON);
        assert_eq!(cfg.horizons.month, 14);
        assert_eq!(cfg.horizons.future_years, 2);
        assert_eq!(
            cfg.backtest.models,
            vec![ModelKind::SimpleSmoothing, ModelKind::Arima]
        );
        assert!(!cfg.backtest.report_failures);
        assert_eq!(cfg.backtest.model.smoothing_level, Some(0.3));
        assert_eq!(cfg.columns.sales, "Revenue");
        assert_eq!(cfg.columns.date, "Date");
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(parse_config("[backtest]\ntrain_ratio = 1.0").is_err());
        assert!(parse_config("[horizons]\nyear = 0").is_err());
        assert!(parse_config("[models]\nenabled = []").is_err());
        assert!(parse_config("[models]\nenabled = [\"prophet\"]").is_err());
        assert!(parse_config("[simple_smoothing]\nalpha = 1.5").is_err());
        assert!(parse_config("[unknown]\nkey = 1").is_err());
    }

    #[test]
    fn missing_non_default_path_is_an_error() {
        let err = load_run_config(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[arima]\nar_order = 3").unwrap();
        let cfg = load_run_config(file.path()).unwrap();
        assert_eq!(cfg.backtest.model.ar_order, 3);
    }
}
