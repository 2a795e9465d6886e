mod backtest;
mod config;
mod constants;
mod generate;
mod model;
mod report;
mod series;
mod views;

use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::backtest::{EvaluationRecord, evaluate};
use crate::config::{DEFAULT_MODEL_CONFIG, load_run_config};
use crate::constants::DATE_FORMAT;
use crate::generate::{DEFAULT_END, DEFAULT_SEED, DEFAULT_START, GeneratorConfig};
use crate::report::{HtmlOptions, Report};
use crate::series::{SalesSeries, load_sales_series};
use crate::views::{View, partition};
use chrono::NaiveDate;
use clap_complete::{Shell, generate};
use tqdm::pbar;
use tracing_subscriber::EnvFilter;

const APP_ABOUT: &str = "salecast - multi-granularity sales forecasting and backtesting";
const DEFAULT_INPUT_CSV: &str = "data/sales.csv";
const DEFAULT_OUTPUT_DIR: &str = "output_predictions";
const CSV_ARCHIVE_EXTENSION: &str = "gz";

#[derive(Parser, Debug)]
#[command(name = "salecast", about = APP_ABOUT)]
struct Args {
    /// Архивировать выгруженные CSV в .csv.gz.
    /// Исходные CSV удаляются после успешной архивации.
    #[arg(long = "archive-csv", global = true)]
    archive_csv: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Полный прогон: разбить ряд на представления, оценить модели, выгрузить CSV и HTML.
    Run {
        /// CSV с дневными продажами.
        #[arg(
            short = 'c',
            long = "csv",
            value_name = "PATH",
            default_value = DEFAULT_INPUT_CSV
        )]
        csv: PathBuf,
        /// Каталог для таблиц и отчёта.
        #[arg(
            short = 'o',
            long = "output-dir",
            value_name = "DIR",
            default_value = DEFAULT_OUTPUT_DIR
        )]
        output_dir: PathBuf,
        /// TOML-файл с параметрами прогона.
        #[arg(
            long = "model-config",
            value_name = "PATH",
            default_value = DEFAULT_MODEL_CONFIG
        )]
        model_config: PathBuf,
        /// Не строить HTML-отчёт.
        #[arg(long = "no-html", default_value_t = true, action = ArgAction::SetFalse)]
        html: bool,
        /// Не минифицировать HTML (по умолчанию минифицируется).
        #[arg(
            long = "no-minify-html",
            default_value_t = true,
            action = ArgAction::SetFalse
        )]
        minify_html: bool,
        /// Сохранить отдельный график для каждого представления.
        #[arg(long = "view-charts")]
        view_charts: bool,
    },
    /// Сгенерировать синтетический CSV с дневными продажами.
    Generate {
        /// Куда сохранить CSV.
        #[arg(
            short = 'o',
            long = "output-csv",
            value_name = "PATH",
            default_value = DEFAULT_INPUT_CSV
        )]
        output_csv: PathBuf,
        /// Первая дата (YYYY-MM-DD).
        #[arg(long, value_name = "DATE", default_value = DEFAULT_START, value_parser = parse_date)]
        start: NaiveDate,
        /// Последняя дата включительно (YYYY-MM-DD).
        #[arg(long, value_name = "DATE", default_value = DEFAULT_END, value_parser = parse_date)]
        end: NaiveDate,
        /// Seed генератора шума.
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Сгенерировать файлы автодополнения для shell.
    Completions {
        /// Целевой shell.
        #[arg(value_enum)]
        shell: Shell,
        /// Куда сохранить файл (если не указано, то stdout).
        #[arg(short = 'o', long = "output", value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

struct RunOptions {
    csv: PathBuf,
    output_dir: PathBuf,
    model_config: PathBuf,
    html: Option<HtmlOptions>,
    archive_csv: bool,
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|err| format!("Invalid date {raw}: {err}"))
}

fn generate_completions(shell: Shell, output: Option<PathBuf>) -> Result<(), String> {
    let mut sink: Box<dyn Write> = match output {
        Some(path) => {
            ensure_parent_dir(&path)?;
            let file = File::create(&path)
                .map_err(|err| format!("Cannot create completions file {}: {err}", path.display()))?;
            Box::new(file)
        }
        None => Box::new(std::io::stdout()),
    };
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_owned();
    generate(shell, &mut cmd, bin_name, &mut sink);
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> Result<(), String> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|err| format!("Cannot create directory {}: {err}", parent.display())),
        _ => Ok(()),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("salecast=info"));
    let ansi = std::io::stdout().is_terminal();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .compact()
        .init();
}

fn headline(message: &str) {
    tracing::info!(status = "start", "{message}");
}

fn info(message: &str) {
    tracing::info!(status = "info", "{message}");
}

fn success(message: &str) {
    tracing::info!(status = "ok", "{message}");
}

fn error(message: &str) {
    tracing::error!(status = "err", "{message}");
}

/// `metrics.csv` -> `metrics.csv.gz` в том же каталоге.
fn archive_path_for(csv_path: &Path) -> Result<PathBuf, String> {
    let Some(file_name) = csv_path.file_name() else {
        return Err(format!("Path {} has no file name", csv_path.display()));
    };
    let mut archived = file_name.to_os_string();
    archived.push(".");
    archived.push(CSV_ARCHIVE_EXTENSION);
    Ok(csv_path.with_file_name(archived))
}

/// Сжимает CSV в соседний `.csv.gz` и удаляет исходник.
fn archive_csv_file(csv_path: &Path) -> Result<PathBuf, String> {
    let archive_path = archive_path_for(csv_path)?;
    let failed = |step: &str, path: &Path, err: std::io::Error| {
        format!("Archiving {}: cannot {step} {}: {err}", csv_path.display(), path.display())
    };

    let mut source = File::open(csv_path).map_err(|err| failed("open", csv_path, err))?;
    let target = File::create(&archive_path).map_err(|err| failed("create", &archive_path, err))?;
    let mut encoder = GzEncoder::new(target, Compression::default());
    std::io::copy(&mut source, &mut encoder)
        .and_then(|_| encoder.finish())
        .map_err(|err| failed("write", &archive_path, err))?;
    fs::remove_file(csv_path).map_err(|err| failed("remove", csv_path, err))?;
    Ok(archive_path)
}

/// Оценивает представления по очереди; отказы моделей уже залогированы внутри `evaluate`.
fn evaluate_views(
    views: Vec<View>,
    settings: &backtest::BacktestSettings,
) -> Vec<(View, EvaluationRecord)> {
    let mut pbar = pbar(Some(views.len()));
    views
        .into_iter()
        .map(|view| {
            let record = evaluate(&view.name, &view.series, view.horizon, settings);
            tracing::debug!(
                view = %view.name,
                frequency = ?view.frequency,
                horizon = view.horizon,
                forecasts = record.forecasts.len(),
                scored = record.metrics.len(),
                failures = record.failures.len(),
                "View evaluated"
            );
            if let Err(err) = pbar.update(1) {
                tracing::warn!(error = %err, "Failed to update progress bar");
            }
            (view, record)
        })
        .collect()
}

fn run_pipeline(options: &RunOptions) -> Result<(), String> {
    let run_config = load_run_config(&options.model_config)?;
    tracing::info!(
        mode = "run",
        archive_csv = options.archive_csv,
        input_csv = %options.csv.display(),
        output_dir = %options.output_dir.display(),
        model_config = %options.model_config.display(),
        train_ratio = run_config.backtest.train_ratio,
        models = ?run_config.backtest.models,
        html = options.html.is_some(),
        "Starting backtest pipeline"
    );

    let daily = load_sales_series(&options.csv, &run_config.columns)
        .map_err(|err| format!("Failed to read sales CSV {}: {err}", options.csv.display()))?;
    info(&format!(
        "Loaded {} daily observations from {}",
        daily.len(),
        options.csv.display()
    ));

    let views = partition(&daily, &run_config.horizons);
    info(&format!("Evaluating {} views", views.len()));
    let report = Report::build(evaluate_views(views, &run_config.backtest));
    let empty_views = report.views().filter(|view| view.series.is_empty()).count();
    let failed = report.failed_models().len();
    if empty_views > 0 || failed > 0 {
        info(&format!(
            "{empty_views} views had no data, {failed} model fits were skipped"
        ));
    }

    let sales = SalesSeries::new(daily);
    report::prepare_output_dir(&options.output_dir).map_err(|err| err.to_string())?;
    let exported = report::export_report(&report, &sales, &options.output_dir)
        .map_err(|err| err.to_string())?;
    success(&format!(
        "Saved prediction tables to {}",
        options.output_dir.display()
    ));

    if let Some(html) = options.html {
        let written = report::render_html(&report, &sales, &options.output_dir, &exported, html)
            .map_err(|err| format!("Failed to render HTML report: {err}"))?;
        success(&format!("Saved {} HTML files", written.len()));
    }

    if options.archive_csv {
        for path in exported.paths() {
            let archive = archive_csv_file(path)?;
            success(&format!("Saved archive to {}", archive.display()));
        }
    }
    Ok(())
}

fn generate_csv(output_csv: &Path, config: &GeneratorConfig, archive: bool) -> Result<(), String> {
    tracing::info!(
        mode = "generate",
        archive_csv = archive,
        output_csv = %output_csv.display(),
        start = %config.start,
        end = %config.end,
        seed = config.seed,
        "Generating synthetic sales"
    );
    let rows = generate::generate_rows(config)?;
    generate::write_rows(&rows, output_csv)
        .map_err(|err| format!("Failed to write CSV {}: {err}", output_csv.display()))?;
    if archive {
        let archive_path = archive_csv_file(output_csv)?;
        success(&format!("Saved archive to {}", archive_path.display()));
    } else {
        success(&format!(
            "Saved {} rows to {}",
            rows.len(),
            output_csv.display()
        ));
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let archive_csv = args.archive_csv;
    let outcome = match args.command {
        Command::Completions { shell, output } => {
            return match generate_completions(shell, output) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("{err}");
                    ExitCode::FAILURE
                }
            };
        }
        Command::Run {
            csv,
            output_dir,
            model_config,
            html,
            minify_html,
            view_charts,
        } => {
            init_logging();
            headline(APP_ABOUT);
            run_pipeline(&RunOptions {
                csv,
                output_dir,
                model_config,
                html: html.then_some(HtmlOptions {
                    minify: minify_html,
                    view_charts,
                }),
                archive_csv,
            })
        }
        Command::Generate {
            output_csv,
            start,
            end,
            seed,
        } => {
            init_logging();
            headline(APP_ABOUT);
            generate_csv(&output_csv, &GeneratorConfig { start, end, seed }, archive_csv)
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error(&err);
            ExitCode::FAILURE
        }
    }
}
