//! Turns the two raw series into the per-day table everything else reads.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, info};

use crate::source::{RetrievalError, Series, SeriesSource};
use crate::wide::{LongRecord, RawSeriesTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedRecord {
    #[serde(with = "ymd_date_format")]
    pub date: NaiveDate,
    pub total_cases: f64,
    pub total_deaths: f64,
    pub new_cases: f64,
    pub new_deaths: f64,
}

/// How many daily deltas went negative and were clamped to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Revisions {
    pub cases: usize,
    pub deaths: usize,
}

/// One row per day, ascending, for a single region.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedTable {
    pub region: String,
    pub records: Vec<PreparedRecord>,
    pub revisions: Revisions,
}

impl PreparedTable {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Writes the table as CSV, dates as `%Y-%m-%d`.
    pub fn write_csv<W: std::io::Write>(&self, out: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(out);
        for rec in &self.records {
            wtr.serialize(rec)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

mod ymd_date_format {
    use serde::Serializer;

    const FORMAT: &str = "%Y-%m-%d";
    pub fn serialize<S>(nd: &chrono::NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}", nd.format(FORMAT));
        serializer.serialize_str(&s)
    }
}

/// Fetches both series and builds the table for `region`.
///
/// Either the whole table is built or an error comes back. A region that is
/// missing from either series is not an error; the table is just empty.
pub fn load(source: &dyn SeriesSource, region: &str) -> Result<PreparedTable, RetrievalError> {
    let confirmed = RawSeriesTable::parse(Series::Confirmed, &source.fetch(Series::Confirmed)?)?;
    let deaths = RawSeriesTable::parse(Series::Deaths, &source.fetch(Series::Deaths)?)?;
    let table = prepare(&confirmed, &deaths, region);
    info!(
        "prepared {} days for {} ({} case / {} death revisions clamped)",
        table.len(),
        region,
        table.revisions.cases,
        table.revisions.deaths
    );
    Ok(table)
}

pub fn prepare(confirmed: &RawSeriesTable, deaths: &RawSeriesTable, region: &str) -> PreparedTable {
    let cases = by_date(confirmed.filter_region(region).melt());
    let deaths = by_date(deaths.filter_region(region).melt());
    debug!(
        "{}: {} {} dates, {} {} dates",
        region,
        cases.len(),
        Series::Confirmed.value_column(),
        deaths.len(),
        Series::Deaths.value_column()
    );

    // Inner join; BTreeMap iteration keeps the dates ascending.
    let joined: Vec<(NaiveDate, Option<f64>, Option<f64>)> = cases
        .iter()
        .filter_map(|(date, c)| deaths.get(date).map(|d| (*date, *c, *d)))
        .collect();

    let case_totals: Vec<Option<f64>> = joined.iter().map(|j| j.1).collect();
    let death_totals: Vec<Option<f64>> = joined.iter().map(|j| j.2).collect();
    let (new_cases, case_revisions) = deltas(&case_totals);
    let (new_deaths, death_revisions) = deltas(&death_totals);

    let records = joined
        .iter()
        .zip(new_cases)
        .zip(new_deaths)
        .map(|(((date, c, d), nc), nd)| PreparedRecord {
            date: *date,
            total_cases: c.unwrap_or(0.0),
            total_deaths: d.unwrap_or(0.0),
            new_cases: nc,
            new_deaths: nd,
        })
        .collect();

    PreparedTable {
        region: region.to_string(),
        records,
        revisions: Revisions {
            cases: case_revisions,
            deaths: death_revisions,
        },
    }
}

/// Collapses sub-region rows so each date appears once. A date stays missing
/// only when every contributing cell was empty.
fn by_date(long: Vec<LongRecord>) -> BTreeMap<NaiveDate, Option<f64>> {
    let mut out: BTreeMap<NaiveDate, Option<f64>> = BTreeMap::new();
    for rec in long {
        let slot = out.entry(rec.date).or_insert(None);
        if let Some(v) = rec.value {
            *slot = Some(slot.unwrap_or(0.0) + v);
        }
    }
    out
}

/// Day-over-day differences of a cumulative series. The first day, and any
/// day next to a missing total, is zero; drops are clamped to zero.
fn deltas(totals: &[Option<f64>]) -> (Vec<f64>, usize) {
    if totals.is_empty() {
        return (Vec::new(), 0);
    }
    let mut clamped = 0;
    let mut out = Vec::with_capacity(totals.len());
    out.push(0.0);
    for (prev, cur) in totals.iter().tuple_windows() {
        let delta = match (prev, cur) {
            (Some(p), Some(c)) => c - p,
            _ => 0.0,
        };
        if delta < 0.0 {
            clamped += 1;
            debug!("clamped revision of {}", delta);
        }
        out.push(delta.max(0.0));
    }
    (out, clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(series: Series, text: &str) -> RawSeriesTable {
        RawSeriesTable::parse(series, text).unwrap()
    }

    #[test]
    fn dates_are_the_sorted_intersection() {
        // Columns deliberately out of order, with one date unique to each side.
        let confirmed = table(
            Series::Confirmed,
            "Country/Region,1/24/20,1/22/20,1/23/20,1/25/20\nUS,7,1,3,9\n",
        );
        let deaths = table(
            Series::Deaths,
            "Country/Region,1/21/20,1/22/20,1/23/20,1/24/20\nUS,0,0,1,2\n",
        );
        let prepared = prepare(&confirmed, &deaths, "US");
        let dates: Vec<NaiveDate> = prepared.records.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![ymd(2020, 1, 22), ymd(2020, 1, 23), ymd(2020, 1, 24)]);
        let totals: Vec<f64> = prepared.records.iter().map(|r| r.total_cases).collect();
        assert_eq!(totals, vec![1.0, 3.0, 7.0]);
    }

    #[test]
    fn deltas_start_at_zero_and_clamp_revisions() {
        let confirmed = table(
            Series::Confirmed,
            "Country/Region,1/22/20,1/23/20,1/24/20,1/25/20\nUS,5,8,6,10\n",
        );
        let deaths = table(
            Series::Deaths,
            "Country/Region,1/22/20,1/23/20,1/24/20,1/25/20\nUS,1,1,2,1\n",
        );
        let prepared = prepare(&confirmed, &deaths, "US");
        let new_cases: Vec<f64> = prepared.records.iter().map(|r| r.new_cases).collect();
        let new_deaths: Vec<f64> = prepared.records.iter().map(|r| r.new_deaths).collect();
        assert_eq!(new_cases, vec![0.0, 3.0, 0.0, 4.0]);
        assert_eq!(new_deaths, vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(prepared.revisions, Revisions { cases: 1, deaths: 1 });
    }

    #[test]
    fn missing_totals_become_zero_with_zero_deltas() {
        let confirmed = table(
            Series::Confirmed,
            "Country/Region,1/22/20,1/23/20,1/24/20\nUS,2,,9\n",
        );
        let deaths = table(Series::Deaths, "Country/Region,1/22/20,1/23/20,1/24/20\nUS,0,0,1\n");
        let prepared = prepare(&confirmed, &deaths, "US");
        let rec = &prepared.records[1];
        assert_eq!(rec.total_cases, 0.0);
        assert_eq!(rec.new_cases, 0.0);
        assert_eq!(prepared.records[2].new_cases, 0.0);
        assert_eq!(prepared.records[2].new_deaths, 1.0);
    }

    #[test]
    fn nan_cells_are_filled_with_zero() {
        let confirmed = table(
            Series::Confirmed,
            "Country/Region,1/22/20,1/23/20,1/24/20\nUS,1,NaN,5\n",
        );
        let deaths = table(Series::Deaths, "Country/Region,1/22/20,1/23/20,1/24/20\nUS,0,NA,1\n");
        let prepared = prepare(&confirmed, &deaths, "US");
        let rows: Vec<(f64, f64, f64, f64)> = prepared
            .records
            .iter()
            .map(|r| (r.total_cases, r.new_cases, r.total_deaths, r.new_deaths))
            .collect();
        assert_eq!(
            rows,
            vec![
                (1.0, 0.0, 0.0, 0.0),
                (0.0, 0.0, 0.0, 0.0),
                (5.0, 0.0, 1.0, 0.0)
            ]
        );
        assert!(prepared
            .records
            .iter()
            .all(|r| r.total_cases.is_finite() && r.total_deaths.is_finite()));
    }

    #[test]
    fn sub_regions_are_summed_per_date() {
        let confirmed = table(
            Series::Confirmed,
            "Province/State,Country/Region,1/22/20,1/23/20\nOntario,Canada,1,2\nQuebec,Canada,3,\n",
        );
        let deaths = table(
            Series::Deaths,
            "Province/State,Country/Region,1/22/20,1/23/20\nOntario,Canada,0,1\nQuebec,Canada,0,0\n",
        );
        let prepared = prepare(&confirmed, &deaths, "Canada");
        assert_eq!(prepared.len(), 2);
        assert_eq!(prepared.records[0].total_cases, 4.0);
        assert_eq!(prepared.records[1].total_cases, 2.0);
        assert_eq!(prepared.records[1].total_deaths, 1.0);
    }

    #[test]
    fn absent_region_gives_empty_table() {
        let confirmed = table(Series::Confirmed, "Country/Region,1/22/20\nUS,1\n");
        let deaths = table(Series::Deaths, "Country/Region,1/22/20\nFrance,1\n");
        let prepared = prepare(&confirmed, &deaths, "US");
        assert!(prepared.is_empty());
        assert_eq!(prepared.revisions, Revisions::default());
    }

    #[test]
    fn export_writes_iso_dates() {
        let confirmed = table(Series::Confirmed, "Country/Region,1/22/20,1/23/20\nUS,1,3\n");
        let deaths = table(Series::Deaths, "Country/Region,1/22/20,1/23/20\nUS,0,1\n");
        let prepared = prepare(&confirmed, &deaths, "US");
        let mut buf = Vec::new();
        prepared.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("date,total_cases,total_deaths,new_cases,new_deaths")
        );
        assert_eq!(lines.next(), Some("2020-01-22,1.0,0.0,0.0,0.0"));
        assert_eq!(lines.next(), Some("2020-01-23,3.0,1.0,2.0,1.0"));
    }
}
