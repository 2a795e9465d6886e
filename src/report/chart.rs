//! Plotly-графики: обзор всего ряда и графики отдельных представлений.

use chrono::NaiveDate;
use itertools::Itertools;
use plotly::color::{Rgb, Rgba};
use plotly::common::{Anchor, DashType, Font, Line, Mode, Orientation, Title};
use plotly::layout::{Axis, ItemClick, Layout, Legend, Margin, TicksDirection};
use plotly::{Configuration, Plot, Scatter};

use super::{Report, ReportEntry};
use crate::backtest::ErrorMetrics;
use crate::constants::DATE_FORMAT;
use crate::model::ModelKind;
use crate::series::{SalesSeries, TimeSeries};
use crate::views::{ViewCategory, ViewKey};

/// Сводные цифры для карточек на странице.
#[derive(Clone, Debug)]
pub(super) struct ChartSummary {
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub observations: usize,
    pub missing: usize,
    pub view_count: usize,
    pub scored_views: usize,
    pub failed_fits: usize,
    pub best_overall: Option<(ModelKind, ErrorMetrics)>,
    pub overall_horizon: Option<usize>,
}

pub(super) struct ChartOutput {
    pub plot: Plot,
    pub summary: ChartSummary,
}

const MAX_PLOT_POINTS: usize = 1200;
const LABEL_DAILY: &str = "Продажи (день)";
const LABEL_WEEKLY: &str = "Среднее за неделю";
const LABEL_MONTHLY: &str = "Среднее за месяц";
const LABEL_TRAIN: &str = "Обучение";
const LABEL_TEST: &str = "Отложенная выборка";
const UNIT_SALES: &str = "продажи";
const FONT_FAMILY: &str = "IBM Plex Sans, PT Sans, Arial, sans-serif";
const DATE_TICKS: &str = "%b\n%Y";
const TEXT_SIZE: usize = 12;
const TICK_TEXT_SIZE: usize = 11;
const LINE_WIDTH_DAILY: f64 = 1.0;
const LINE_WIDTH_AVERAGE: f64 = 2.2;
const LINE_WIDTH_FORECAST: f64 = 2.4;
/// Отступы графика: слева, справа, сверху, снизу.
const MARGINS: [usize; 4] = [70, 30, 64, 50];
const X_TICKS_COUNT: usize = 10;
const DAILY_ALPHA: f64 = 0.35;
const COLOR_WEEKLY: (u8, u8, u8) = (36, 100, 166);
const COLOR_MONTHLY: (u8, u8, u8) = (31, 36, 48);
const COLOR_TEST: (u8, u8, u8) = (120, 120, 120);
const COLOR_MODEL_SIMPLE: (u8, u8, u8) = (200, 67, 46);
const COLOR_MODEL_SEASONAL: (u8, u8, u8) = (46, 139, 87);
const COLOR_MODEL_ARIMA: (u8, u8, u8) = (142, 68, 173);
const COLOR_INK: (u8, u8, u8) = (31, 36, 48);

fn rgb((r, g, b): (u8, u8, u8)) -> Rgb {
    Rgb::new(r, g, b)
}

fn with_alpha((r, g, b): (u8, u8, u8), alpha: f64) -> Rgba {
    Rgba::new(r, g, b, alpha)
}

/// Цвет текста с прозрачностью, для осей, сетки и рамок.
fn ink(alpha: f64) -> Rgba {
    with_alpha(COLOR_INK, alpha)
}

const fn model_color(model: ModelKind) -> (u8, u8, u8) {
    match model {
        ModelKind::SimpleSmoothing => COLOR_MODEL_SIMPLE,
        ModelKind::HoltWinters => COLOR_MODEL_SEASONAL,
        ModelKind::Arima => COLOR_MODEL_ARIMA,
    }
}

fn format_dates(dates: &[NaiveDate]) -> Vec<String> {
    dates
        .iter()
        .map(|date| date.format(DATE_FORMAT).to_string())
        .collect_vec()
}

/// Точки ряда без пропусков в виде (даты, значения) для Plotly.
fn series_points(series: &TimeSeries) -> (Vec<String>, Vec<f64>) {
    let clean = series.drop_missing();
    (format_dates(&clean.dates()), clean.present_values())
}

fn line_trace(
    (dates, values): (Vec<String>, Vec<f64>),
    name: &str,
    line: Line,
) -> Box<Scatter<String, f64>> {
    Scatter::new(dates, values)
        .mode(Mode::Lines)
        .line(line)
        .name(name)
}

fn forecast_traces(plot: &mut Plot, entry: &ReportEntry) {
    for result in entry.record.forecasts.values() {
        plot.add_trace(line_trace(
            series_points(&result.forecast),
            result.model.display_name(),
            Line::new()
                .color(rgb(model_color(result.model)))
                .width(LINE_WIDTH_FORECAST)
                .dash(DashType::Dash),
        ));
    }
}

/// Обзор: дневной ряд, недельные и месячные средние и прогнозы по всему ряду.
pub(super) fn build_overview_chart(report: &Report, sales: &SalesSeries) -> ChartOutput {
    let (daily_dates, daily_values) = series_points(&sales.daily);
    let (daily_dates_plot, daily_values_plot) =
        downsample_min_max(&daily_dates, &daily_values, MAX_PLOT_POINTS);

    let mut plot = Plot::new();
    plot.add_trace(line_trace(
        (daily_dates_plot, daily_values_plot),
        LABEL_DAILY,
        Line::new()
            .color(with_alpha(COLOR_WEEKLY, DAILY_ALPHA))
            .width(LINE_WIDTH_DAILY)
            .simplify(true),
    ));
    plot.add_trace(line_trace(
        series_points(&sales.weekly),
        LABEL_WEEKLY,
        Line::new()
            .color(rgb(COLOR_WEEKLY))
            .width(LINE_WIDTH_AVERAGE)
            .simplify(true),
    ));
    plot.add_trace(line_trace(
        series_points(&sales.monthly),
        LABEL_MONTHLY,
        Line::new()
            .color(rgb(COLOR_MONTHLY))
            .width(LINE_WIDTH_AVERAGE),
    ));

    let overall = report.entry(ViewCategory::Overall, ViewKey::Overall);
    if let Some(entry) = overall {
        forecast_traces(&mut plot, entry);
    }

    plot.set_layout(base_layout());
    plot.set_configuration(Configuration::new().responsive(true));

    let summary = ChartSummary {
        first_date: sales
            .daily
            .first_date()
            .map(|date| date.format(DATE_FORMAT).to_string()),
        last_date: sales
            .daily
            .last_date()
            .map(|date| date.format(DATE_FORMAT).to_string()),
        observations: sales.daily.len(),
        missing: sales.daily.len() - sales.daily.drop_missing().len(),
        view_count: report.view_count(),
        scored_views: report
            .entries()
            .filter(|entry| !entry.record.metrics.is_empty())
            .count(),
        failed_fits: report.failed_models().len(),
        best_overall: report.best_model(ViewCategory::Overall, ViewKey::Overall),
        overall_horizon: overall.map(|entry| entry.view.horizon),
    };

    ChartOutput { plot, summary }
}

/// График представления: обучающая часть, отложенная выборка и прогнозы моделей.
pub(super) fn build_view_chart(entry: &ReportEntry) -> Plot {
    let clean = entry.view.series.drop_missing();
    let (train, test) = clean.split_at(entry.record.train_len);

    let mut plot = Plot::new();
    let (train_dates, train_values) = series_points(&train);
    plot.add_trace(line_trace(
        downsample_min_max(&train_dates, &train_values, MAX_PLOT_POINTS),
        LABEL_TRAIN,
        Line::new()
            .color(rgb(COLOR_WEEKLY))
            .width(LINE_WIDTH_DAILY)
            .simplify(true),
    ));
    if !test.is_empty() {
        plot.add_trace(line_trace(
            series_points(&test),
            LABEL_TEST,
            Line::new().color(rgb(COLOR_TEST)).width(LINE_WIDTH_DAILY),
        ));
    }
    forecast_traces(&mut plot, entry);

    plot.set_layout(base_layout().title(Title::with_text(entry.view.name.clone())));
    plot.set_configuration(Configuration::new().responsive(true));
    plot
}

fn base_layout() -> Layout {
    let [left, right, top, bottom] = MARGINS;
    Layout::new()
        .font(Font::new().family(FONT_FAMILY).size(TEXT_SIZE).color(rgb(COLOR_INK)))
        .auto_size(true)
        .margin(Margin::new().left(left).right(right).top(top).bottom(bottom))
        .show_legend(true)
        .legend(
            Legend::new()
                .orientation(Orientation::Horizontal)
                .item_click(ItemClick::Toggle)
                .x(0.5)
                .x_anchor(Anchor::Center)
                .y(1.0)
                .y_anchor(Anchor::Bottom)
                .font(Font::new().size(TEXT_SIZE))
                .border_color(ink(0.15))
                .border_width(1),
        )
        .x_axis(
            sales_axis(0.05)
                .tick_format(DATE_TICKS)
                .n_ticks(X_TICKS_COUNT),
        )
        .y_axis(
            sales_axis(0.08)
                .title(Title::with_text(UNIT_SALES).font(Font::new().size(TEXT_SIZE)))
                .separate_thousands(true),
        )
}

/// Общая часть обеих осей; различается только плотность сетки.
fn sales_axis(grid_alpha: f64) -> Axis {
    Axis::new()
        .tick_font(Font::new().size(TICK_TEXT_SIZE))
        .ticks(TicksDirection::Outside)
        .tick_color(ink(0.4))
        .show_line(true)
        .line_color(ink(0.3))
        .grid_color(ink(grid_alpha))
        .auto_margin(true)
}

/// Прореживает длинный ряд: в каждом бакете остаются точки минимума и максимума.
fn downsample_min_max<X: Clone>(x: &[X], y: &[f64], limit: usize) -> (Vec<X>, Vec<f64>) {
    let len = y.len();
    if len != x.len() || len <= limit || limit < 3 {
        return (x.to_vec(), y.to_vec());
    }

    let bucket_count = (limit.saturating_sub(2) / 2).max(1);
    let bucket_size = (len.saturating_sub(2) as f64 / bucket_count as f64).ceil() as usize;

    let mut indices = vec![0];
    if bucket_size > 0 {
        let mut start = 1usize;
        while start < len - 1 {
            let end = (start + bucket_size).min(len - 1);
            let bucket = start..end;
            let min_idx = bucket
                .clone()
                .min_by(|&a, &b| y[a].total_cmp(&y[b]))
                .unwrap_or(start);
            let max_idx = bucket
                .max_by(|&a, &b| y[a].total_cmp(&y[b]))
                .unwrap_or(start);
            indices.push(min_idx.min(max_idx));
            indices.push(min_idx.max(max_idx));
            start = end;
        }
    }
    indices.push(len - 1);
    indices.dedup();

    indices
        .into_iter()
        .map(|idx| (x[idx].clone(), y[idx]))
        .unzip()
}
