//! Модели прогноза: простое и сезонное экспоненциальное сглаживание, ARIMA(p, d, 0).
//!
//! Набор моделей закрыт (`ModelKind`), а каждый отказ подгонки перечислен в `ModelError`,
//! поэтому вызывающая сторона решает, что делать с неудачной моделью.

use std::error::Error;
use std::fmt;

use argmin::core::{CostFunction, Error as ArgminError, Executor, State};
use argmin::solver::neldermead::NelderMead;
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};

use crate::series::TimeSeries;

const DEFAULT_MAX_ITERS: u64 = 500;
const DEFAULT_AR_ORDER: usize = 5;
const DEFAULT_DIFFERENCING: usize = 1;
const MIN_SIMPLE_POINTS: usize = 2;
const MIN_SEASONAL_POINTS: usize = 8;
const SEASONS_IN_TRAINING: usize = 4;
const MIN_SMOOTHING: f64 = 1e-4;
const MAX_SMOOTHING: f64 = 1.0 - 1e-4;
const SIMPLEX_STEP: f64 = 1.0;
const SD_TOLERANCE: f64 = 1e-10;
/// Стоимость недопустимых параметров; единственное значение, которое считается расходимостью.
const REJECTED_COST: f64 = f64::MAX;
const UNIT_ROOT_MARGIN: f64 = 1e-8;

/// Поддерживаемые модели; порядок объявления задаёт порядок колонок в отчётах.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelKind {
    SimpleSmoothing,
    HoltWinters,
    Arima,
}

impl ModelKind {
    pub const ALL: [Self; 3] = [Self::SimpleSmoothing, Self::HoltWinters, Self::Arima];

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::SimpleSmoothing => "Simple Exponential Smoothing",
            Self::HoltWinters => "Holt-Winters",
            Self::Arima => "ARIMA",
        }
    }

    pub const fn id(self) -> &'static str {
        match self {
            Self::SimpleSmoothing => "simple-smoothing",
            Self::HoltWinters => "holt-winters",
            Self::Arima => "arima",
        }
    }

    /// Разбирает идентификатор из конфигурации (`holt_winters`, `Holt-Winters`, `hw`, ...).
    pub fn from_id(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "simple-smoothing" | "simple-exponential-smoothing" | "ses" => {
                Some(Self::SimpleSmoothing)
            }
            "holt-winters" | "seasonal-smoothing" | "hw" => Some(Self::HoltWinters),
            "arima" => Some(Self::Arima),
            _ => None,
        }
    }

    /// Подгоняет модель на обучающем ряду; пропуски в ряду игнорируются.
    pub fn fit(self, train: &TimeSeries, settings: &ModelSettings) -> Result<FittedModel, ModelError> {
        let values = train.present_values();
        self.ensure_points(&values, settings)?;
        let last_date = train
            .drop_missing()
            .last_date()
            .ok_or(ModelError::InsufficientData {
                model: self,
                required: self.min_points(settings),
                actual: 0,
            })?;
        let fit_error = |failure| ModelError::Fit {
            model: self,
            failure,
        };

        match self {
            Self::SimpleSmoothing => fit_simple_smoothing(&values, settings)
                .map(|(alpha, level)| {
                    FittedModel::SimpleSmoothing(SimpleSmoothingFit {
                        alpha,
                        level,
                        last_date,
                    })
                })
                .map_err(fit_error),
            Self::HoltWinters => fit_holt_winters(&values, settings.max_iters)
                .map(|state| FittedModel::HoltWinters(HoltWintersFit { state, last_date }))
                .map_err(fit_error),
            Self::Arima => fit_arima(&values, settings.ar_order, settings.differencing)
                .map(|state| FittedModel::Arima(ArimaFit { state, last_date }))
                .map_err(fit_error),
        }
    }

    const fn min_points(self, settings: &ModelSettings) -> usize {
        match self {
            Self::SimpleSmoothing => MIN_SIMPLE_POINTS,
            Self::HoltWinters => MIN_SEASONAL_POINTS,
            // После d разностей нужно хотя бы p + 1 строк регрессии на p лагах.
            Self::Arima => settings.differencing + 2 * settings.ar_order + 1,
        }
    }

    fn ensure_points(self, values: &[f64], settings: &ModelSettings) -> Result<(), ModelError> {
        let required = self.min_points(settings);
        if values.len() < required {
            return Err(ModelError::InsufficientData {
                model: self,
                required,
                actual: values.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ModelSettings {
    pub max_iters: u64,
    /// Фиксированный уровень сглаживания для простой модели; `None` означает подбор.
    pub smoothing_level: Option<f64>,
    pub ar_order: usize,
    pub differencing: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            max_iters: DEFAULT_MAX_ITERS,
            smoothing_level: None,
            ar_order: DEFAULT_AR_ORDER,
            differencing: DEFAULT_DIFFERENCING,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FitFailure {
    Diverged,
    SingularMatrix,
    NonStationary,
    InvalidSeasonalPeriod(usize),
    Optimizer(String),
}

impl fmt::Display for FitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diverged => f.write_str("fit diverged"),
            Self::SingularMatrix => f.write_str("singular design matrix"),
            Self::NonStationary => f.write_str("AR part is not stationary after differencing"),
            Self::InvalidSeasonalPeriod(period) => write!(f, "invalid seasonal period {period}"),
            Self::Optimizer(reason) => write!(f, "optimizer failed: {reason}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ModelError {
    InsufficientData {
        model: ModelKind,
        required: usize,
        actual: usize,
    },
    Fit {
        model: ModelKind,
        failure: FitFailure,
    },
}

impl ModelError {
    pub const fn model(&self) -> ModelKind {
        match self {
            Self::InsufficientData { model, .. } | Self::Fit { model, .. } => *model,
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData {
                model,
                required,
                actual,
            } => write!(
                f,
                "{model}: need at least {required} observations, got {actual}"
            ),
            Self::Fit { model, failure } => write!(f, "{model}: {failure}"),
        }
    }
}

impl Error for ModelError {}

#[derive(Clone, Debug)]
pub struct SimpleSmoothingFit {
    pub alpha: f64,
    pub level: f64,
    last_date: NaiveDate,
}

#[derive(Clone, Debug)]
pub struct HoltWintersFit {
    pub state: HoltWintersState,
    last_date: NaiveDate,
}

#[derive(Clone, Debug)]
pub struct ArimaFit {
    pub state: ArimaState,
    last_date: NaiveDate,
}

/// Подогнанная модель; умеет строить дневной прогноз от последней обучающей даты.
#[derive(Clone, Debug)]
pub enum FittedModel {
    SimpleSmoothing(SimpleSmoothingFit),
    HoltWinters(HoltWintersFit),
    Arima(ArimaFit),
}

impl FittedModel {
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::SimpleSmoothing(_) => ModelKind::SimpleSmoothing,
            Self::HoltWinters(_) => ModelKind::HoltWinters,
            Self::Arima(_) => ModelKind::Arima,
        }
    }

    pub fn forecast(&self, horizon: usize) -> TimeSeries {
        let (values, last_date) = match self {
            Self::SimpleSmoothing(fit) => (vec![fit.level; horizon], fit.last_date),
            Self::HoltWinters(fit) => (fit.state.forecast(horizon), fit.last_date),
            Self::Arima(fit) => (fit.state.forecast(horizon), fit.last_date),
        };
        TimeSeries::daily_after(last_date, &values)
    }
}

/// Подобранные параметры в одну строку для логов.
impl fmt::Display for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimpleSmoothing(fit) => write!(f, "alpha={:.4}", fit.alpha),
            Self::HoltWinters(fit) => write!(
                f,
                "alpha={:.4} beta={:.4} gamma={:.4} period={}",
                fit.state.alpha,
                fit.state.beta,
                fit.state.gamma,
                fit.state.seasonals.len()
            ),
            Self::Arima(fit) => write!(
                f,
                "p={} d={} phi=[{}]",
                fit.state.coefficients.len(),
                fit.state.tails.len(),
                fit.state
                    .coefficients
                    .iter()
                    .map(|phi| format!("{phi:.4}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }
}

fn logistic(raw: f64) -> f64 {
    (1.0 / (1.0 + (-raw).exp())).clamp(MIN_SMOOTHING, MAX_SMOOTHING)
}

fn finite_or_rejected(cost: f64) -> f64 {
    if cost.is_finite() { cost } else { REJECTED_COST }
}

/// Минимизирует стоимость симплекс-методом Нелдера–Мида вокруг `initial`.
fn minimize<P>(problem: P, initial: &[f64], max_iters: u64) -> Result<Vec<f64>, FitFailure>
where
    P: CostFunction<Param = Vec<f64>, Output = f64>,
{
    let mut simplex = vec![initial.to_vec()];
    for idx in 0..initial.len() {
        let mut vertex = initial.to_vec();
        vertex[idx] += SIMPLEX_STEP;
        simplex.push(vertex);
    }
    let solver = NelderMead::new(simplex)
        .with_sd_tolerance(SD_TOLERANCE)
        .map_err(|err| FitFailure::Optimizer(err.to_string()))?;
    let result = Executor::new(problem, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(|err| FitFailure::Optimizer(err.to_string()))?;

    let best_cost = result.state.get_best_cost();
    if !best_cost.is_finite() || best_cost >= REJECTED_COST {
        return Err(FitFailure::Diverged);
    }
    result
        .state
        .get_best_param()
        .cloned()
        .ok_or_else(|| FitFailure::Optimizer("no parameters returned from optimizer".to_string()))
}

/// Одношаговые ошибки простого сглаживания; возвращает (SSE, последний уровень).
fn simple_smoothing_pass(values: &[f64], alpha: f64) -> (f64, f64) {
    let mut level = values[0];
    let mut sse = 0.0;
    for &obs in &values[1..] {
        let err = obs - level;
        sse += err * err;
        level = alpha.mul_add(err, level);
    }
    (sse, level)
}

#[derive(Clone)]
struct SimpleSmoothingProblem {
    y: Vec<f64>,
}

impl CostFunction for SimpleSmoothingProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        let Some(&raw_alpha) = param.first() else {
            return Ok(REJECTED_COST);
        };
        Ok(finite_or_rejected(simple_smoothing_pass(&self.y, logistic(raw_alpha)).0))
    }
}

fn fit_simple_smoothing(values: &[f64], settings: &ModelSettings) -> Result<(f64, f64), FitFailure> {
    let alpha = match settings.smoothing_level {
        Some(alpha) => alpha,
        None => {
            let problem = SimpleSmoothingProblem { y: values.to_vec() };
            let best = minimize(problem, &[0.0], settings.max_iters)?;
            logistic(best[0])
        }
    };
    let (sse, level) = simple_smoothing_pass(values, alpha);
    if !sse.is_finite() || !level.is_finite() {
        return Err(FitFailure::Diverged);
    }
    Ok((alpha, level))
}

/// Итоговое состояние аддитивной модели Холта–Винтерса.
#[derive(Clone, Debug)]
pub struct HoltWintersState {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub level: f64,
    pub trend: f64,
    /// Сезонные компоненты, индексированные по `t % period`.
    pub seasonals: Vec<f64>,
    /// Длина обучающего ряда; следующий шаг имеет индекс `observed`.
    pub observed: usize,
}

impl HoltWintersState {
    fn forecast(&self, horizon: usize) -> Vec<f64> {
        let period = self.seasonals.len();
        (1..=horizon)
            .map(|step| {
                let season = self.seasonals[(self.observed + step - 1) % period];
                (step as f64).mul_add(self.trend, self.level) + season
            })
            .collect()
    }
}

/// Стартовые уровень, тренд и сезонность по первым двум сезонам.
fn initial_holt_winters(values: &[f64], period: usize) -> (f64, f64, Vec<f64>) {
    let first_season = &values[..period];
    let level = first_season.iter().sum::<f64>() / period as f64;
    let trend = (0..period)
        .map(|idx| (values[period + idx] - values[idx]) / period as f64)
        .sum::<f64>()
        / period as f64;
    let seasonals = first_season.iter().map(|value| value - level).collect();
    (level, trend, seasonals)
}

fn holt_winters_pass(
    values: &[f64],
    period: usize,
    alpha: f64,
    beta: f64,
    gamma: f64,
) -> (f64, HoltWintersState) {
    let (mut level, mut trend, mut seasonals) = initial_holt_winters(values, period);
    let mut sse = 0.0;
    for (t, &obs) in values.iter().enumerate() {
        let slot = t % period;
        let season = seasonals[slot];
        let err = obs - (level + trend + season);
        sse += err * err;

        let next_level = alpha.mul_add(obs - season, (1.0 - alpha) * (level + trend));
        trend = beta.mul_add(next_level - level, (1.0 - beta) * trend);
        seasonals[slot] = gamma.mul_add(obs - next_level, (1.0 - gamma) * season);
        level = next_level;
    }
    (
        sse,
        HoltWintersState {
            alpha,
            beta,
            gamma,
            level,
            trend,
            seasonals,
            observed: values.len(),
        },
    )
}

#[derive(Clone)]
struct HoltWintersProblem {
    y: Vec<f64>,
    period: usize,
}

impl CostFunction for HoltWintersProblem {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, ArgminError> {
        if param.len() != 3 {
            return Ok(REJECTED_COST);
        }
        let (sse, _) = holt_winters_pass(
            &self.y,
            self.period,
            logistic(param[0]),
            logistic(param[1]),
            logistic(param[2]),
        );
        Ok(finite_or_rejected(sse))
    }
}

fn fit_holt_winters(values: &[f64], max_iters: u64) -> Result<HoltWintersState, FitFailure> {
    let period = values.len() / SEASONS_IN_TRAINING;
    if period < 2 || 2 * period > values.len() {
        return Err(FitFailure::InvalidSeasonalPeriod(period));
    }
    let problem = HoltWintersProblem {
        y: values.to_vec(),
        period,
    };
    // Старт: умеренное сглаживание уровня, слабое для тренда и сезона.
    let best = minimize(problem, &[-1.0, -2.0, -2.0], max_iters)?;
    let (sse, state) = holt_winters_pass(
        values,
        period,
        logistic(best[0]),
        logistic(best[1]),
        logistic(best[2]),
    );
    let finite_state = state.level.is_finite()
        && state.trend.is_finite()
        && state.seasonals.iter().all(|value| value.is_finite());
    if !sse.is_finite() || !finite_state {
        return Err(FitFailure::Diverged);
    }
    Ok(state)
}

/// Коэффициенты AR и хвосты ряда, нужные для обратного интегрирования прогноза.
#[derive(Clone, Debug)]
pub struct ArimaState {
    pub coefficients: Vec<f64>,
    /// Последние `p` значений ряда после дифференцирования.
    recent: Vec<f64>,
    /// Последнее значение на каждом уровне дифференцирования, начиная с исходного ряда.
    tails: Vec<f64>,
}

impl ArimaState {
    fn forecast(&self, horizon: usize) -> Vec<f64> {
        let order = self.coefficients.len();
        let mut history = self.recent.clone();
        for _ in 0..horizon {
            let next = self
                .coefficients
                .iter()
                .enumerate()
                .map(|(lag, phi)| phi * history[history.len() - 1 - lag])
                .sum::<f64>();
            history.push(next);
        }
        let mut values = history.split_off(order);
        for &start in self.tails.iter().rev() {
            values = values
                .iter()
                .scan(start, |acc, diff| {
                    *acc += diff;
                    Some(*acc)
                })
                .collect();
        }
        values
    }
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

/// Условный МНК для AR(p) без свободного члена на d-кратно продифференцированном ряду.
fn fit_arima(values: &[f64], order: usize, differencing: usize) -> Result<ArimaState, FitFailure> {
    let mut tails = Vec::with_capacity(differencing);
    let mut diffed = values.to_vec();
    for _ in 0..differencing {
        tails.push(diffed.last().copied().unwrap_or_default());
        diffed = difference(&diffed);
    }

    let rows = diffed.len().saturating_sub(order);
    if rows <= order {
        return Err(FitFailure::SingularMatrix);
    }
    let design = DMatrix::from_fn(rows, order, |row, col| diffed[row + order - 1 - col]);
    let target = DVector::from_fn(rows, |row, _| diffed[row + order]);
    let design_t = design.transpose();
    let gram = &design_t * &design;
    let moment = &design_t * &target;
    let coefficients = gram.lu().solve(&moment).ok_or(FitFailure::SingularMatrix)?;
    if coefficients.iter().any(|value| !value.is_finite()) {
        return Err(FitFailure::SingularMatrix);
    }
    let coefficients: Vec<f64> = coefficients.iter().copied().collect();

    if !is_stationary(&coefficients) {
        return Err(FitFailure::NonStationary);
    }

    Ok(ArimaState {
        coefficients,
        recent: diffed[diffed.len() - order..].to_vec(),
        tails,
    })
}

/// Все собственные значения сопровождающей матрицы AR лежат строго внутри единичного круга.
fn is_stationary(coefficients: &[f64]) -> bool {
    let order = coefficients.len();
    let companion = DMatrix::from_fn(order, order, |row, col| {
        if row == 0 {
            coefficients[col]
        } else if row == col + 1 {
            1.0
        } else {
            0.0
        }
    });
    companion
        .complex_eigenvalues()
        .iter()
        .all(|root| root.re.hypot(root.im) < 1.0 - UNIT_ROOT_MARGIN)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> TimeSeries {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let dates: Vec<_> = (0..values.len())
            .map(|idx| start + chrono::Duration::days(idx as i64))
            .collect();
        TimeSeries::from_values(&dates, values).unwrap()
    }

    fn noise(idx: usize) -> f64 {
        ((idx * 7919 + 13) % 97) as f64 / 10.0 - 4.8
    }

    #[test]
    fn simple_smoothing_with_unit_alpha_repeats_last_value() {
        let train = series(&[100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0]);
        let settings = ModelSettings {
            smoothing_level: Some(1.0),
            ..ModelSettings::default()
        };
        let fitted = ModelKind::SimpleSmoothing.fit(&train, &settings).unwrap();
        let forecast = fitted.forecast(2);
        assert_eq!(forecast.present_values(), vec![170.0, 170.0]);
        assert_eq!(
            forecast.first_date(),
            NaiveDate::from_ymd_opt(2020, 1, 9)
        );
    }

    #[test]
    fn optimised_simple_smoothing_is_flat() {
        let train = series(&[100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0]);
        let fitted = ModelKind::SimpleSmoothing
            .fit(&train, &ModelSettings::default())
            .unwrap();
        let values = fitted.forecast(2).present_values();
        assert_eq!(values.len(), 2);
        assert!(values[0].is_finite());
        assert!((values[0] - values[1]).abs() < f64::EPSILON);
        // Растущий ряд: оптимальный уровень тянется к последнему значению.
        assert!(values[0] > 150.0 && values[0] <= 170.0);
    }

    #[test]
    fn simple_smoothing_fits_huge_magnitudes() {
        let values: Vec<f64> = (0..20)
            .map(|idx| if idx % 2 == 0 { 0.0 } else { 1e15 })
            .collect();
        let fitted = ModelKind::SimpleSmoothing
            .fit(&series(&values), &ModelSettings::default())
            .unwrap();
        let forecast = fitted.forecast(3).present_values();
        assert_eq!(forecast.len(), 3);
        assert!(forecast.iter().all(|value| (0.0..=1e15).contains(value)));
    }

    #[test]
    fn simple_smoothing_needs_two_points() {
        let err = ModelKind::SimpleSmoothing
            .fit(&series(&[5.0]), &ModelSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::InsufficientData {
                model: ModelKind::SimpleSmoothing,
                required: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn holt_winters_rejects_short_series() {
        let err = ModelKind::HoltWinters
            .fit(&series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]), &ModelSettings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::InsufficientData { required: 8, actual: 7, .. }
        ));
    }

    #[test]
    fn holt_winters_forecasts_seasonal_series() {
        let values: Vec<f64> = (0..40)
            .map(|idx| {
                let phase = (idx % 10) as f64 / 10.0 * std::f64::consts::TAU;
                100.0 + 0.5 * idx as f64 + 10.0 * phase.sin()
            })
            .collect();
        let fitted = ModelKind::HoltWinters
            .fit(&series(&values), &ModelSettings::default())
            .unwrap();
        let FittedModel::HoltWinters(fit) = &fitted else {
            panic!("unexpected model variant");
        };
        assert_eq!(fit.state.seasonals.len(), 10);

        let forecast = fitted.forecast(12).present_values();
        assert_eq!(forecast.len(), 12);
        assert!(forecast.iter().all(|value| value.is_finite()));
        assert!(forecast.iter().all(|value| (80.0..=160.0).contains(value)));
    }

    #[test]
    fn arima_rejects_constant_series() {
        let err = ModelKind::Arima
            .fit(&series(&[42.0; 30]), &ModelSettings::default())
            .unwrap_err();
        assert_eq!(
            err,
            ModelError::Fit {
                model: ModelKind::Arima,
                failure: FitFailure::SingularMatrix
            }
        );
    }

    #[test]
    fn arima_rejects_explosive_differences() {
        let mut values = vec![0.0];
        let mut step: f64 = 1.0;
        for _ in 0..20 {
            step *= 1.5;
            values.push(values[values.len() - 1] + step);
        }
        let settings = ModelSettings {
            ar_order: 1,
            ..ModelSettings::default()
        };
        let err = ModelKind::Arima.fit(&series(&values), &settings).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Fit {
                failure: FitFailure::NonStationary,
                ..
            }
        ));
    }

    #[test]
    fn arima_needs_enough_rows() {
        let err = ModelKind::Arima
            .fit(&series(&[1.0, 3.0, 2.0, 5.0, 4.0, 6.0, 8.0, 7.0, 9.0, 8.0, 10.0]), &ModelSettings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ModelError::InsufficientData { required: 12, actual: 11, .. }
        ));
    }

    #[test]
    fn arima_forecast_integrates_from_last_value() {
        let mut values = vec![100.0];
        let mut diff = 0.0;
        for idx in 0..200 {
            diff = 0.5f64.mul_add(diff, noise(idx));
            values.push(values[values.len() - 1] + diff);
        }
        let fitted = ModelKind::Arima
            .fit(&series(&values), &ModelSettings::default())
            .unwrap();
        let FittedModel::Arima(fit) = &fitted else {
            panic!("unexpected model variant");
        };
        assert_eq!(fit.state.coefficients.len(), 5);

        let forecast = fitted.forecast(30).present_values();
        assert_eq!(forecast.len(), 30);
        let last = values[values.len() - 1];
        // Стационарные приращения затухают, прогноз остаётся рядом с последним уровнем.
        assert!(forecast.iter().all(|value| (value - last).abs() < 50.0));
    }

    #[test]
    fn arima_forecast_of_pure_ar_matches_recursion() {
        let state = ArimaState {
            coefficients: vec![0.5],
            recent: vec![2.0],
            tails: vec![10.0],
        };
        assert_eq!(state.forecast(3), vec![11.0, 11.5, 11.75]);
    }

    #[test]
    fn model_ids_round_trip() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_id(kind.id()), Some(kind));
        }
        assert_eq!(ModelKind::from_id("Holt_Winters"), Some(ModelKind::HoltWinters));
        assert_eq!(ModelKind::from_id("prophet"), None);
    }
}
