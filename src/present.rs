//! Read-only views over the session's prepared table.

use chrono::NaiveDate;
use itertools::Itertools;
use thiserror::Error;

use crate::prepare::{PreparedRecord, PreparedTable};
use crate::session::Session;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Please load the data first.")]
pub struct NotReady;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalCases,
    NewCases,
    TotalDeaths,
    NewDeaths,
}

impl Metric {
    /// Column order used by the correlation matrix.
    pub const ALL: [Metric; 4] = [
        Metric::TotalCases,
        Metric::NewCases,
        Metric::TotalDeaths,
        Metric::NewDeaths,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Metric::TotalCases => "total_cases",
            Metric::NewCases => "new_cases",
            Metric::TotalDeaths => "total_deaths",
            Metric::NewDeaths => "new_deaths",
        }
    }

    fn value(self, rec: &PreparedRecord) -> f64 {
        match self {
            Metric::TotalCases => rec.total_cases,
            Metric::NewCases => rec.new_cases,
            Metric::TotalDeaths => rec.total_deaths,
            Metric::NewDeaths => rec.new_deaths,
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| format!("unknown metric `{}`", s))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub region: String,
    pub total_cases: f64,
    pub total_deaths: f64,
    pub avg_new_cases: f64,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Summary of Findings (JHU Data):")?;
        writeln!(
            f,
            "- Total Cases in {}: {}",
            self.region,
            thousands(self.total_cases as i64)
        )?;
        writeln!(
            f,
            "- Total Deaths in {}: {}",
            self.region,
            thousands(self.total_deaths as i64)
        )?;
        writeln!(f, "- Average Daily New Cases: {:.2}", self.avg_new_cases)?;
        writeln!(f)?;
        writeln!(f, "Line plots show case trends with peaks.")?;
        write!(f, "Heatmap shows correlation between metrics.")
    }
}

/// Pearson correlations between the four metrics, in `Metric::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub labels: [&'static str; 4],
    pub values: [[f64; 4]; 4],
}

fn ready(session: &Session) -> Result<&PreparedTable, NotReady> {
    session.table().ok_or(NotReady)
}

fn column(table: &PreparedTable, metric: Metric) -> Vec<f64> {
    table.records.iter().map(|r| metric.value(r)).collect()
}

fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

pub fn summarize(session: &Session) -> Result<Summary, NotReady> {
    let table = ready(session)?;
    let new_cases = column(table, Metric::NewCases);
    Ok(Summary {
        region: table.region.clone(),
        total_cases: max(&column(table, Metric::TotalCases)),
        total_deaths: max(&column(table, Metric::TotalDeaths)),
        avg_new_cases: new_cases.iter().sum::<f64>() / new_cases.len() as f64,
    })
}

pub fn series_over_time(
    session: &Session,
    metric: Metric,
) -> Result<Vec<(NaiveDate, f64)>, NotReady> {
    let table = ready(session)?;
    Ok(table
        .records
        .iter()
        .map(|r| (r.date, metric.value(r)))
        .collect())
}

pub fn correlation_matrix(session: &Session) -> Result<CorrelationMatrix, NotReady> {
    let table = ready(session)?;
    let columns: Vec<Vec<f64>> = Metric::ALL.iter().map(|&m| column(table, m)).collect();

    let mut values = [[f64::NAN; 4]; 4];
    for (i, j) in (0..4).tuple_combinations() {
        let r = pearson(&columns[i], &columns[j]);
        values[i][j] = r;
        values[j][i] = r;
    }
    for (i, col) in columns.iter().enumerate() {
        // A constant column has no defined correlation, not even with itself.
        values[i][i] = if sum_sq_dev(col) > 0.0 { 1.0 } else { f64::NAN };
    }

    Ok(CorrelationMatrix {
        labels: Metric::ALL.map(Metric::name),
        values,
    })
}

pub fn totals_bar(session: &Session) -> Result<[(&'static str, f64); 2], NotReady> {
    let table = ready(session)?;
    Ok([
        ("Total Cases", max(&column(table, Metric::TotalCases))),
        ("Total Deaths", max(&column(table, Metric::TotalDeaths))),
    ])
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn sum_sq_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>()
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let (vx, vy) = (sum_sq_dev(xs), sum_sq_dev(ys));
    if vx == 0.0 || vy == 0.0 {
        return f64::NAN;
    }
    let (mx, my) = (mean(xs), mean(ys));
    let cov: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    (cov / (vx * vy).sqrt()).clamp(-1.0, 1.0)
}

/// `1234567` -> `1,234,567`
fn thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let grouped = digits
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|c| std::str::from_utf8(c).unwrap_or_default())
        .join(",");
    if n < 0 {
        format!("-{}", grouped)
    } else {
        grouped
    }
}
