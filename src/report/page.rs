//! Рендер HTML-страницы отчёта: карточки, обзорный график и таблица метрик.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use minify_html::{Cfg, minify as minify_bytes};
use plotly::Plot;

use super::chart::ChartSummary;
use super::{Report, ReportEntry};
use crate::model::ModelKind;
use crate::views::{ViewCategory, ViewKey};

pub(super) const INDEX_FILE: &str = "index.html";
const PAGE_TITLE: &str = "Прогноз продаж";
const PAGE_SUBTITLE: &str =
    "Бэктест моделей сглаживания и ARIMA по всему ряду, годам, месяцам и «будущим» окнам.";
const GENERATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M UTC";
const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const PLOT_ID: &str = "overview-plot";
const NO_VALUE: &str = "—";
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Относительные ссылки: выгруженные CSV и графики представлений.
pub(super) struct PageLinks<'a> {
    pub downloads: &'a [String],
    pub charts: &'a BTreeMap<(ViewCategory, ViewKey), String>,
}

const STYLE: &str = "
:root {
    color-scheme: light;
    --bg: #f7f6f2;
    --card: #ffffff;
    --ink: #1f2430;
    --muted: #56606f;
    --accent: #2464a6;
    --bad: #c8432e;
    --border: rgba(31, 36, 48, 0.08);
}
* { box-sizing: border-box; }
body {
    margin: 0;
    background: var(--bg);
    color: var(--ink);
    font-family: \"IBM Plex Sans\", \"PT Sans\", sans-serif;
}
.page { max-width: 1240px; margin: 40px auto 60px; padding: 0 24px; }
.title { font-size: 26px; font-weight: 600; margin: 0; }
.subtitle { margin: 6px 0 22px; color: var(--muted); font-size: 13px; }
.summary-grid {
    display: grid;
    grid-template-columns: repeat(auto-fit, minmax(220px, 1fr));
    gap: 14px;
    margin-bottom: 18px;
}
.summary-card, .card, .table-card {
    background: var(--card);
    border-radius: 16px;
    padding: 14px 16px;
    border: 1px solid var(--border);
}
.summary-label {
    font-size: 11px;
    text-transform: uppercase;
    letter-spacing: 0.08em;
    color: var(--muted);
}
.summary-value { font-size: 20px; font-weight: 600; margin-top: 6px; }
.summary-sub { margin-top: 6px; font-size: 12px; color: var(--muted); }
.table-card { margin-top: 18px; overflow-x: auto; }
.table-title { margin: 0 0 10px; font-size: 16px; font-weight: 600; }
.metrics-table { width: 100%; border-collapse: collapse; font-size: 13px; }
.metrics-table th, .metrics-table td {
    padding: 7px 10px;
    border-bottom: 1px solid var(--border);
    text-align: left;
    white-space: nowrap;
}
.metrics-table th {
    color: var(--muted);
    font-weight: 500;
    text-transform: uppercase;
    font-size: 11px;
}
.metrics-table td.best { font-weight: 600; color: var(--accent); }
.metrics-table td.failed { color: var(--bad); }
.metrics-table td.muted { color: var(--muted); }
#overview-plot { width: 100%; min-height: 560px; }
.downloads a, footer a {
    color: var(--accent);
    text-decoration: none;
    border-bottom: 1px dashed rgba(36, 100, 166, 0.45);
    margin-right: 12px;
}
footer { margin-top: 16px; font-size: 12px; color: var(--muted); text-align: right; }
";

pub(super) fn render_report_page(
    plot: &Plot,
    summary: &ChartSummary,
    report: &Report,
    links: &PageLinks<'_>,
    generated_at: DateTime<Utc>,
) -> String {
    let plot_html = plot.to_inline_html(Some(PLOT_ID));
    let generated_label = generated_at.format(GENERATED_AT_FORMAT).to_string();
    let span_label = match (&summary.first_date, &summary.last_date) {
        (Some(first), Some(last)) => format!("{first} .. {last}"),
        _ => NO_VALUE.to_string(),
    };
    let best_label = summary.best_overall.map_or_else(
        || (NO_VALUE.to_string(), "Нет оценённых моделей".to_string()),
        |(model, metrics)| {
            (
                model.display_name().to_string(),
                format!("MSE {:.1} · MAE {:.1}", metrics.mse, metrics.mae),
            )
        },
    );
    let horizon_label = summary
        .overall_horizon
        .map_or_else(String::new, |horizon| format!("Горизонт {horizon} дн."));

    let page = html! {
        (DOCTYPE)
        html lang="ru" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (PAGE_TITLE) }
                script src=(PLOTLY_CDN) {}
                style { (PreEscaped(STYLE)) }
            }
            body {
                div class="page" {
                    header {
                        h1 class="title" { (PAGE_TITLE) }
                        p class="subtitle" { (PAGE_SUBTITLE) }
                    }
                    section class="summary-grid" {
                        div class="summary-card" {
                            div class="summary-label" { "История" }
                            div class="summary-value" { (span_label) }
                            div class="summary-sub" {
                                (summary.observations) " дней, пропусков: " (summary.missing)
                            }
                        }
                        div class="summary-card" {
                            div class="summary-label" { "Представления" }
                            div class="summary-value" { (summary.view_count) }
                            div class="summary-sub" { "С метриками: " (summary.scored_views) }
                        }
                        div class="summary-card" {
                            div class="summary-label" { "Отказы моделей" }
                            div class="summary-value" { (summary.failed_fits) }
                            div class="summary-sub" { "Модель пропущена, прогон продолжен" }
                        }
                        div class="summary-card" {
                            div class="summary-label" { "Лучшая модель (весь ряд)" }
                            div class="summary-value" { (best_label.0) }
                            div class="summary-sub" { (best_label.1) " " (horizon_label) }
                        }
                    }
                    div class="card" {
                        (PreEscaped(plot_html))
                    }
                    @for category in ViewCategory::ALL {
                        @let entries: Vec<&ReportEntry> = report.category(category).collect();
                        @if !entries.is_empty() {
                            (metrics_table(category, &entries, links))
                        }
                    }
                    @if !links.downloads.is_empty() {
                        p class="downloads" {
                            "CSV: "
                            @for name in links.downloads {
                                a href=(name) download { (name) }
                            }
                        }
                    }
                    footer {
                        "Версия: " (APP_VERSION) " · Сгенерировано: " (generated_label)
                    }
                }
            }
        }
    };
    page.into_string()
}

fn metrics_table(
    category: ViewCategory,
    entries: &[&ReportEntry],
    links: &PageLinks<'_>,
) -> Markup {
    html! {
        section class="table-card" {
            h2 class="table-title" { (category.label()) }
            table class="metrics-table" data-category=(category.id()) {
                thead {
                    tr {
                        th { "Представление" }
                        th { "Обучение / тест" }
                        @for model in ModelKind::ALL {
                            th { (model.display_name()) " MSE" }
                            th { (model.display_name()) " MAE" }
                        }
                    }
                }
                tbody {
                    @for entry in entries {
                        @let best = entry.record.best_model().map(|(model, _)| model);
                        tr {
                            td {
                                @if let Some(href) = links.charts.get(&(entry.view.category, entry.view.key)) {
                                    a href=(href) { (entry.view.name) }
                                } @else {
                                    (entry.view.name)
                                }
                            }
                            td class="muted" { (entry.record.train_len) " / " (entry.record.test_len) }
                            @for model in ModelKind::ALL {
                                @if let Some(metrics) = entry.record.metrics.get(&model) {
                                    @let class = if best == Some(model) { "best" } else { "" };
                                    td class=(class) { (format!("{:.2}", metrics.mse)) }
                                    td class=(class) { (format!("{:.2}", metrics.mae)) }
                                } @else if let Some(err) = entry.record.failures.get(&model) {
                                    td class="failed" colspan="2" title=(err.to_string()) { "ошибка" }
                                } @else if entry.record.forecasts.contains_key(&model) {
                                    td class="muted" colspan="2" { "без оценки" }
                                } @else {
                                    td class="muted" colspan="2" { (NO_VALUE) }
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Минифицирует HTML вместе со встроенными CSS и JS.
pub(super) fn minify(page: &str) -> String {
    let cfg = Cfg {
        minify_css: true,
        minify_js: true,
        ..Cfg::default()
    };
    String::from_utf8_lossy(&minify_bytes(page.as_bytes(), &cfg)).into_owned()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::super::chart::build_overview_chart;
    use super::*;
    use crate::report::tests::{sample_report, sample_series};
    use crate::series::SalesSeries;

    fn render(report: &Report, charts: &BTreeMap<(ViewCategory, ViewKey), String>) -> String {
        let series = sample_series(800);
        let output = build_overview_chart(report, &SalesSeries::new(series));
        let downloads = vec!["metrics.csv".to_string()];
        let links = PageLinks {
            downloads: &downloads,
            charts,
        };
        let generated_at = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 0).unwrap();
        render_report_page(&output.plot, &output.summary, report, &links, generated_at)
    }

    #[test]
    fn page_lists_every_category_and_view() {
        let report = sample_report(&sample_series(800));
        let page = render(&report, &BTreeMap::new());
        assert!(page.starts_with("<!DOCTYPE html>"));
        for category in ViewCategory::ALL {
            assert!(page.contains(category.label()));
        }
        assert!(page.contains("Overall Sales"));
        assert!(page.contains("Future Month 12 Sales"));
        assert!(page.contains("2025-01-02 03:04 UTC"));
        assert!(page.contains("2021-01-01 .. 2023-03-11"));
        assert!(page.contains(PLOT_ID));
        assert!(page.contains("href=\"metrics.csv\""));
    }

    #[test]
    fn view_names_link_to_their_charts() {
        let report = sample_report(&sample_series(800));
        let charts = BTreeMap::from([(
            (ViewCategory::Yearly, ViewKey::Year(2022)),
            "charts/year_2022_sales.html".to_string(),
        )]);
        let page = render(&report, &charts);
        assert!(page.contains("href=\"charts/year_2022_sales.html\""));
    }

    #[test]
    fn minify_shrinks_page_and_keeps_content() {
        let report = sample_report(&sample_series(800));
        let page = render(&report, &BTreeMap::new());
        let minified = minify(&page);
        assert!(minified.len() < page.len());
        assert!(minified.contains("Overall Sales"));
    }
}
