//! Хронологический бэктест одного представления ряда.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use tracing::{debug, warn};

use crate::model::{ModelError, ModelKind, ModelSettings};
use crate::series::TimeSeries;

pub const DEFAULT_TRAIN_RATIO: f64 = 0.8;
const MIN_EVALUATION_POINTS: usize = 2;

#[derive(Clone, Debug)]
pub struct BacktestSettings {
    pub train_ratio: f64,
    pub models: Vec<ModelKind>,
    pub model: ModelSettings,
    /// Логировать отказы моделей на уровне `warn` (иначе `debug`).
    pub report_failures: bool,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            train_ratio: DEFAULT_TRAIN_RATIO,
            models: ModelKind::ALL.to_vec(),
            model: ModelSettings::default(),
            report_failures: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EvaluationError {
    InsufficientData { actual: usize },
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData { actual } => write!(
                f,
                "need at least {MIN_EVALUATION_POINTS} non-missing observations, got {actual}"
            ),
        }
    }
}

impl Error for EvaluationError {}

#[derive(Clone, Debug)]
pub struct Split {
    pub train: TimeSeries,
    pub test: TimeSeries,
}

/// Отбрасывает пропуски и делит ряд: первые `floor(ratio * n)` точек идут в обучение.
pub fn split_chronologically(
    series: &TimeSeries,
    train_ratio: f64,
) -> Result<Split, EvaluationError> {
    let clean = series.drop_missing();
    if clean.len() < MIN_EVALUATION_POINTS {
        return Err(EvaluationError::InsufficientData {
            actual: clean.len(),
        });
    }
    let train_len = (clean.len() as f64 * train_ratio).floor() as usize;
    let (train, test) = clean.split_at(train_len);
    Ok(Split { train, test })
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorMetrics {
    pub mse: f64,
    pub mae: f64,
}

pub fn mean_squared_error(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (f - a).powi(2))
        .sum::<f64>()
        / n as f64
}

pub fn mean_absolute_error(forecast: &[f64], actual: &[f64]) -> f64 {
    let n = forecast.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (f - a).abs())
        .sum::<f64>()
        / n as f64
}

/// Метрики по первым `forecast.len()` тестовым точкам; `None`, если тест короче прогноза.
pub fn score(forecast: &[f64], actual: &[f64]) -> Option<ErrorMetrics> {
    if forecast.is_empty() || actual.len() < forecast.len() {
        return None;
    }
    let actual = &actual[..forecast.len()];
    Some(ErrorMetrics {
        mse: mean_squared_error(forecast, actual),
        mae: mean_absolute_error(forecast, actual),
    })
}

#[derive(Clone, Debug)]
pub struct ModelResult {
    pub model: ModelKind,
    pub forecast: TimeSeries,
}

/// Итог оценки одного представления. Ключи `metrics` всегда есть в `forecasts`.
#[derive(Clone, Debug, Default)]
pub struct EvaluationRecord {
    pub view_name: String,
    pub forecasts: BTreeMap<ModelKind, ModelResult>,
    pub metrics: BTreeMap<ModelKind, ErrorMetrics>,
    pub failures: BTreeMap<ModelKind, ModelError>,
    pub train_len: usize,
    pub test_len: usize,
}

impl EvaluationRecord {
    pub fn empty(view_name: &str) -> Self {
        Self {
            view_name: view_name.to_string(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty()
    }

    /// Оценённая модель с наименьшим MSE.
    pub fn best_model(&self) -> Option<(ModelKind, ErrorMetrics)> {
        self.metrics
            .iter()
            .min_by(|(_, left), (_, right)| left.mse.total_cmp(&right.mse))
            .map(|(&model, &metrics)| (model, metrics))
    }
}

fn log_model_failure(view_name: &str, err: &ModelError, report_failures: bool) {
    if report_failures {
        warn!(view = view_name, model = %err.model(), error = %err, "Model skipped");
    } else {
        debug!(view = view_name, model = %err.model(), error = %err, "Model skipped");
    }
}

/// Обучает каждую модель на обучающей части и сравнивает прогноз с отложенной.
/// Отказ отдельной модели не прерывает оценку представления.
pub fn evaluate(
    view_name: &str,
    series: &TimeSeries,
    horizon: usize,
    settings: &BacktestSettings,
) -> EvaluationRecord {
    let split = match split_chronologically(series, settings.train_ratio) {
        Ok(split) => split,
        Err(err) => {
            if settings.report_failures {
                warn!(view = view_name, error = %err, "View skipped");
            } else {
                debug!(view = view_name, error = %err, "View skipped");
            }
            return EvaluationRecord::empty(view_name);
        }
    };

    let mut record = EvaluationRecord {
        train_len: split.train.len(),
        test_len: split.test.len(),
        ..EvaluationRecord::empty(view_name)
    };
    let test_values = split.test.present_values();

    for &kind in &settings.models {
        let outcome = kind.fit(&split.train, &settings.model).map(|fitted| {
            debug!(view = view_name, model = %fitted.kind(), params = %fitted, "Model fitted");
            fitted.forecast(horizon)
        });
        match outcome {
            Ok(forecast) => {
                if let Some(metrics) = score(&forecast.present_values(), &test_values) {
                    debug!(
                        view = view_name,
                        model = %kind,
                        mse = metrics.mse,
                        mae = metrics.mae,
                        "Model scored"
                    );
                    record.metrics.insert(kind, metrics);
                }
                record.forecasts.insert(
                    kind,
                    ModelResult {
                        model: kind,
                        forecast,
                    },
                );
            }
            Err(err) => {
                log_model_failure(view_name, &err, settings.report_failures);
                record.failures.insert(kind, err);
            }
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::series::Observation;

    fn daily(values: &[Option<f64>]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
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

    fn progression() -> TimeSeries {
        let values: Vec<_> = (0..10).map(|idx| Some(100.0 + 10.0 * f64::from(idx))).collect();
        daily(&values)
    }

    fn unit_alpha_settings() -> BacktestSettings {
        BacktestSettings {
            models: vec![ModelKind::SimpleSmoothing],
            model: ModelSettings {
                smoothing_level: Some(1.0),
                ..ModelSettings::default()
            },
            ..BacktestSettings::default()
        }
    }

    #[test]
    fn split_sizes_follow_ratio() {
        for n in 2..60 {
            let series = daily(&vec![Some(1.0); n]);
            let split = split_chronologically(&series, DEFAULT_TRAIN_RATIO).unwrap();
            assert_eq!(split.train.len() + split.test.len(), n);
            assert_eq!(split.train.len(), (0.8 * n as f64).floor() as usize);
        }
    }

    #[test]
    fn split_drops_missing_values_first() {
        let series = daily(&[Some(1.0), None, Some(2.0), Some(3.0), None, Some(4.0), Some(5.0)]);
        let split = split_chronologically(&series, DEFAULT_TRAIN_RATIO).unwrap();
        assert_eq!(split.train.len(), 4);
        assert_eq!(split.test.present_values(), vec![5.0]);
    }

    #[test]
    fn mse_matches_definition() {
        let record = evaluate("progression", &progression(), 2, &unit_alpha_settings());
        let metrics = record.metrics[&ModelKind::SimpleSmoothing];
        assert!((metrics.mse - 250.0).abs() < 1e-9);
        assert!((metrics.mae - 15.0).abs() < 1e-9);
        assert!(metrics.mse >= 0.0);
    }

    #[test]
    fn optimised_forecast_scores_against_first_test_values() {
        let settings = BacktestSettings {
            models: vec![ModelKind::SimpleSmoothing],
            ..BacktestSettings::default()
        };
        let record = evaluate("progression", &progression(), 2, &settings);
        let forecast = record.forecasts[&ModelKind::SimpleSmoothing]
            .forecast
            .present_values();
        assert!((forecast[0] - forecast[1]).abs() < f64::EPSILON);
        let expected = ((180.0 - forecast[0]).powi(2) + (190.0 - forecast[1]).powi(2)) / 2.0;
        let metrics = record.metrics[&ModelKind::SimpleSmoothing];
        assert!((metrics.mse - expected).abs() < 1e-9);
    }

    #[test]
    fn short_test_split_keeps_forecast_unscored() {
        let record = evaluate("progression", &progression(), 5, &unit_alpha_settings());
        assert_eq!(record.test_len, 2);
        assert!(record.forecasts.contains_key(&ModelKind::SimpleSmoothing));
        assert!(record.metrics.is_empty());
        assert_eq!(
            record.forecasts[&ModelKind::SimpleSmoothing].forecast.len(),
            5
        );
    }

    #[test]
    fn tiny_series_gives_empty_record() {
        let settings = BacktestSettings::default();
        for values in [vec![], vec![Some(1.0)], vec![Some(1.0), None, None]] {
            let record = evaluate("tiny", &daily(&values), 3, &settings);
            assert!(record.is_empty());
            assert!(record.metrics.is_empty());
            assert_eq!(record.view_name, "tiny");
        }
    }

    #[test]
    fn all_models_failing_gives_empty_maps() {
        let settings = BacktestSettings {
            models: vec![ModelKind::HoltWinters, ModelKind::Arima],
            ..BacktestSettings::default()
        };
        let series = daily(&[Some(1.0), Some(2.0), Some(4.0), Some(3.0), Some(5.0)]);
        let record = evaluate("short", &series, 1, &settings);
        assert!(record.forecasts.is_empty());
        assert!(record.metrics.is_empty());
        assert_eq!(record.failures.len(), 2);
    }

    #[test]
    fn quiet_failures_are_still_recorded() {
        let settings = BacktestSettings {
            models: vec![ModelKind::SimpleSmoothing, ModelKind::HoltWinters, ModelKind::Arima],
            report_failures: false,
            ..BacktestSettings::default()
        };
        let series = daily(&[Some(1.0), Some(2.0), Some(4.0), Some(3.0), Some(5.0)]);
        let record = evaluate("quiet", &series, 1, &settings);
        assert_eq!(record.train_len, 4);
        assert!(record.forecasts.contains_key(&ModelKind::SimpleSmoothing));
        assert_eq!(
            record.failures.keys().copied().collect::<Vec<_>>(),
            vec![ModelKind::HoltWinters, ModelKind::Arima]
        );
        assert!(matches!(
            record.failures[&ModelKind::HoltWinters],
            ModelError::InsufficientData { required: 8, actual: 4, .. }
        ));

        let skipped = evaluate("quiet", &daily(&[Some(1.0)]), 1, &settings);
        assert!(skipped.is_empty());
    }

    #[test]
    fn metrics_keys_are_subset_of_forecasts() {
        let values: Vec<_> = (0..120)
            .map(|idx| Some(200.0 + f64::from(idx % 7) * 5.0 + f64::from(idx) * 0.3))
            .collect();
        let record = evaluate("weekly", &daily(&values), 10, &BacktestSettings::default());
        assert!(!record.forecasts.is_empty());
        for kind in record.metrics.keys() {
            assert!(record.forecasts.contains_key(kind));
        }
        for result in record.forecasts.values() {
            assert_eq!(result.forecast.len(), 10);
        }
    }

    #[test]
    fn score_requires_enough_test_values() {
        assert!(score(&[1.0, 2.0], &[1.0]).is_none());
        assert!(score(&[], &[1.0]).is_none());
        let metrics = score(&[1.0, 2.0], &[2.0, 4.0, 100.0]).unwrap();
        assert!((metrics.mse - 2.5).abs() < 1e-12);
        assert!((metrics.mae - 1.5).abs() < 1e-12);
    }
}
