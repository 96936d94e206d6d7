//! Wide JHU time-series tables: one row per region, one column per day.

use chrono::NaiveDate;

use crate::source::{RetrievalError, Series};

pub const REGION_COLUMN: &str = "Country/Region";
/// Identifier columns that carry nothing we need. Any of them may be absent.
const DROPPED_COLUMNS: [&str; 3] = ["Province/State", "Lat", "Long"];
const HEADER_DATE_FORMAT: &str = "%m/%d/%y";
/// Cell spellings that mean "no value" rather than a count.
const MISSING_MARKERS: [&str; 10] = [
    "NaN", "nan", "-NaN", "-nan", "NA", "N/A", "n/a", "null", "NULL", "None",
];

#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub region: String,
    /// Cumulative counts, aligned with `RawSeriesTable::dates`. Empty cells are `None`.
    pub values: Vec<Option<f64>>,
}

/// One row of the melted table.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRecord {
    pub region: String,
    pub date: chrono::NaiveDate,
    pub value: Option<f64>,
}

/// Snapshot of one downloaded series, identifier columns already dropped.
#[derive(Debug, Clone)]
pub struct RawSeriesTable {
    pub series: Series,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<RawRow>,
}

impl RawSeriesTable {
    pub fn parse(series: Series, text: &str) -> Result<Self, RetrievalError> {
        let mut rdr = csv::Reader::from_reader(text.as_bytes());
        let headers = rdr.headers()?.clone();

        let region_idx = headers
            .iter()
            .position(|h| h == REGION_COLUMN)
            .ok_or_else(|| RetrievalError::MissingColumn {
                series,
                column: REGION_COLUMN.to_string(),
            })?;

        let mut date_cols = Vec::new();
        for (idx, name) in headers.iter().enumerate() {
            if idx == region_idx || DROPPED_COLUMNS.contains(&name) {
                continue;
            }
            // Checked for the whole table, so an odd header fails even when the region is absent.
            let date = NaiveDate::parse_from_str(name, HEADER_DATE_FORMAT).map_err(|source| {
                RetrievalError::BadDate {
                    series,
                    column: name.to_string(),
                    source,
                }
            })?;
            date_cols.push((idx, date));
        }

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let region = record.get(region_idx).unwrap_or_default().to_string();
            let values = date_cols
                .iter()
                .map(|&(idx, _)| parse_count(series, &headers[idx], record.get(idx).unwrap_or("")))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push(RawRow { region, values });
        }

        Ok(Self {
            series,
            dates: date_cols.into_iter().map(|(_, date)| date).collect(),
            rows,
        })
    }

    /// Rows whose region matches `region` exactly (case-sensitive).
    pub fn filter_region(&self, region: &str) -> RawSeriesTable {
        RawSeriesTable {
            series: self.series,
            dates: self.dates.clone(),
            rows: self
                .rows
                .iter()
                .filter(|r| r.region == region)
                .cloned()
                .collect(),
        }
    }

    /// Wide to long: one record per (row, date), grouped by date column.
    pub fn melt(&self) -> Vec<LongRecord> {
        self.dates
            .iter()
            .enumerate()
            .flat_map(|(col, date)| {
                self.rows.iter().map(move |row| LongRecord {
                    region: row.region.clone(),
                    date: *date,
                    value: row.values[col],
                })
            })
            .collect()
    }
}

fn parse_count(series: Series, column: &str, cell: &str) -> Result<Option<f64>, RetrievalError> {
    let cell = cell.trim();
    if cell.is_empty() || MISSING_MARKERS.contains(&cell) {
        return Ok(None);
    }
    match cell.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(RetrievalError::BadValue {
            series,
            column: column.to_string(),
            value: cell.to_string(),
        }),
    }
}
