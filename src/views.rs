//! Разбиение дневного ряда на представления: весь ряд, годы, месяцы и «будущие» окна.

use std::fmt;

use chrono::Datelike;

use crate::series::{Frequency, TimeSeries};

const DEFAULT_OVERALL_HORIZON: usize = 365;
const DEFAULT_YEAR_HORIZON: usize = 52;
const DEFAULT_MONTH_HORIZON: usize = 30;
const DEFAULT_FUTURE_YEARS: usize = 3;
const MONTHS: std::ops::RangeInclusive<u32> = 1..=12;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HorizonSettings {
    pub overall: usize,
    pub year: usize,
    pub month: usize,
    pub future_year: usize,
    pub future_month: usize,
    /// Сколько лет после последнего года данных строить «будущими» окнами.
    pub future_years: usize,
}

impl Default for HorizonSettings {
    fn default() -> Self {
        Self {
            overall: DEFAULT_OVERALL_HORIZON,
            year: DEFAULT_YEAR_HORIZON,
            month: DEFAULT_MONTH_HORIZON,
            future_year: DEFAULT_OVERALL_HORIZON,
            future_month: DEFAULT_MONTH_HORIZON,
            future_years: DEFAULT_FUTURE_YEARS,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewCategory {
    Overall,
    Yearly,
    FutureYearly,
    Monthly,
    FutureMonthly,
}

impl ViewCategory {
    pub const ALL: [Self; 5] = [
        Self::Overall,
        Self::Yearly,
        Self::FutureYearly,
        Self::Monthly,
        Self::FutureMonthly,
    ];

    pub const fn id(self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Yearly => "yearly",
            Self::FutureYearly => "future_yearly",
            Self::Monthly => "monthly",
            Self::FutureMonthly => "future_monthly",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Overall => "Весь ряд",
            Self::Yearly => "По годам",
            Self::FutureYearly => "Будущие годы",
            Self::Monthly => "По месяцам",
            Self::FutureMonthly => "Будущие месяцы",
        }
    }
}

impl fmt::Display for ViewCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewKey {
    Overall,
    Year(i32),
    Month(u32),
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overall => f.write_str("overall"),
            Self::Year(year) => write!(f, "{year}"),
            Self::Month(month) => write!(f, "{month}"),
        }
    }
}

/// Именованный срез ряда с горизонтом прогноза.
#[derive(Clone, Debug)]
pub struct View {
    pub category: ViewCategory,
    pub key: ViewKey,
    pub name: String,
    pub series: TimeSeries,
    pub horizon: usize,
    pub frequency: Frequency,
}

impl View {
    fn new(
        category: ViewCategory,
        key: ViewKey,
        name: String,
        series: TimeSeries,
        horizon: usize,
    ) -> Self {
        Self {
            category,
            key,
            name,
            series,
            horizon,
            frequency: Frequency::Daily,
        }
    }

    /// Имя для файлов: `Future Year 2026 Sales` -> `future_year_2026_sales`.
    pub fn slug(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

/// Строит все представления в порядке: весь ряд, годы, будущие годы, месяцы, будущие месяцы.
/// «Будущие» окна обучаются только на данных до соответствующего года.
pub fn partition(daily: &TimeSeries, horizons: &HorizonSettings) -> Vec<View> {
    let mut views = vec![View::new(
        ViewCategory::Overall,
        ViewKey::Overall,
        "Overall Sales".to_string(),
        daily.clone(),
        horizons.overall,
    )];

    views.extend(daily.years().into_iter().map(|year| {
        View::new(
            ViewCategory::Yearly,
            ViewKey::Year(year),
            format!("Year {year} Sales"),
            daily.filter_dates(|date| date.year() == year),
            horizons.year,
        )
    }));

    let max_year = daily.max_year();
    if let Some(max_year) = max_year {
        let first_future = max_year + 1;
        let future_years = (0..horizons.future_years)
            .filter_map(|offset| i32::try_from(offset).ok())
            .map(|offset| first_future + offset);
        views.extend(future_years.map(|year| {
            View::new(
                ViewCategory::FutureYearly,
                ViewKey::Year(year),
                format!("Future Year {year} Sales"),
                daily.filter_dates(|date| date.year() < year),
                horizons.future_year,
            )
        }));
    }

    views.extend(MONTHS.map(|month| {
        View::new(
            ViewCategory::Monthly,
            ViewKey::Month(month),
            format!("Month {month} Sales"),
            daily.filter_dates(|date| date.month() == month),
            horizons.month,
        )
    }));

    views.extend(MONTHS.map(|month| {
        let series = max_year.map_or_else(TimeSeries::default, |current| {
            daily.filter_dates(|date| date.year() < current && date.month() == month)
        });
        View::new(
            ViewCategory::FutureMonthly,
            ViewKey::Month(month),
            format!("Future Month {month} Sales"),
            series,
            horizons.future_month,
        )
    }));

    views
}
