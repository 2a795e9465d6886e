//! Сводный отчёт по всем представлениям и его вывод в CSV/HTML.

mod chart;
mod export;
mod page;

use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::backtest::{ErrorMetrics, EvaluationRecord};
use crate::model::{ModelError, ModelKind};
use crate::series::SalesSeries;
use crate::views::{View, ViewCategory, ViewKey};

pub use export::{ExportError, ExportedFiles, export_report, prepare_output_dir};

const CHARTS_DIR: &str = "charts";

/// Представление вместе с результатом его оценки.
#[derive(Clone, Debug)]
pub struct ReportEntry {
    pub view: View,
    pub record: EvaluationRecord,
}

/// Отказ модели на конкретном представлении.
#[derive(Debug)]
pub struct FailedModel<'a> {
    pub view: &'a View,
    pub model: ModelKind,
    pub error: &'a ModelError,
}

/// Результаты прогона, сгруппированные по категории и ключу представления.
/// Строится один раз и дальше только читается.
#[derive(Clone, Debug, Default)]
pub struct Report {
    categories: BTreeMap<ViewCategory, BTreeMap<ViewKey, ReportEntry>>,
}

impl Report {
    pub fn build(evaluations: Vec<(View, EvaluationRecord)>) -> Self {
        let categories = evaluations.into_iter().fold(
            BTreeMap::<ViewCategory, BTreeMap<ViewKey, ReportEntry>>::new(),
            |mut acc, (view, record)| {
                acc.entry(view.category)
                    .or_default()
                    .insert(view.key, ReportEntry { view, record });
                acc
            },
        );
        Self { categories }
    }

    pub fn record(&self, category: ViewCategory, key: ViewKey) -> Option<&EvaluationRecord> {
        self.entry(category, key).map(|entry| &entry.record)
    }

    pub fn entry(&self, category: ViewCategory, key: ViewKey) -> Option<&ReportEntry> {
        self.categories
            .get(&category)
            .and_then(|entries| entries.get(&key))
    }

    /// Записи одной категории в порядке ключей.
    pub fn category(&self, category: ViewCategory) -> impl Iterator<Item = &ReportEntry> {
        self.categories
            .get(&category)
            .into_iter()
            .flat_map(BTreeMap::values)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ReportEntry> {
        self.categories.values().flat_map(BTreeMap::values)
    }

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.entries().map(|entry| &entry.view)
    }

    pub fn view_count(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    pub fn failed_models(&self) -> Vec<FailedModel<'_>> {
        self.entries()
            .flat_map(|entry| {
                entry
                    .record
                    .failures
                    .iter()
                    .map(|(&model, error)| FailedModel {
                        view: &entry.view,
                        model,
                        error,
                    })
            })
            .collect()
    }

    pub fn best_model(
        &self,
        category: ViewCategory,
        key: ViewKey,
    ) -> Option<(ModelKind, ErrorMetrics)> {
        self.record(category, key)?.best_model()
    }
}

/// Параметры HTML-вывода.
#[derive(Clone, Copy, Debug)]
pub struct HtmlOptions {
    pub minify: bool,
    pub view_charts: bool,
}

/// Рисует обзорную страницу `index.html` и, по запросу, графики по представлениям.
/// Возвращает пути ко всем записанным файлам.
pub fn render_html(
    report: &Report,
    sales: &SalesSeries,
    output_dir: &Path,
    exported: &ExportedFiles,
    options: HtmlOptions,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let mut written = Vec::new();
    let chart_links = if options.view_charts {
        let charts_dir = output_dir.join(CHARTS_DIR);
        fs::create_dir_all(&charts_dir)?;
        report
            .entries()
            .filter(|entry| !entry.view.series.is_empty())
            .map(|entry| -> Result<_, Box<dyn Error>> {
                let file_name = format!("{}.html", entry.view.slug());
                let path = charts_dir.join(&file_name);
                let plot = chart::build_view_chart(entry);
                fs::write(&path, plot.to_html())?;
                written.push(path);
                Ok(((entry.view.category, entry.view.key), format!("{CHARTS_DIR}/{file_name}")))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?
    } else {
        BTreeMap::new()
    };

    let chart::ChartOutput { plot, summary } = chart::build_overview_chart(report, sales);
    let downloads = exported.file_names();
    let page = page::render_report_page(
        &plot,
        &summary,
        report,
        &page::PageLinks {
            downloads: &downloads,
            charts: &chart_links,
        },
        Utc::now(),
    );
    let page = if options.minify {
        page::minify(&page)
    } else {
        page
    };
    let index = output_dir.join(page::INDEX_FILE);
    fs::write(&index, page)?;
    written.push(index);
    Ok(written)
}
