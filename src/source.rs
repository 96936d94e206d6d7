//! Where the two raw time-series tables come from.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

const CONFIRMED_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv";
const DEATHS_URL: &str = "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv";

/// Anything that can go wrong between asking for the data and holding a
/// prepared table. Nothing else is reported by a load.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("{series} table has no `{column}` column")]
    MissingColumn { series: Series, column: String },
    #[error("{series} table: column `{column}` is not a %m/%d/%y date: {source}")]
    BadDate {
        series: Series,
        column: String,
        source: chrono::ParseError,
    },
    #[error("{series} table: `{value}` in column `{column}` is not a count")]
    BadValue {
        series: Series,
        column: String,
        value: String,
    },
}

/// The two cumulative series published by JHU CSSE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Confirmed,
    Deaths,
}

impl Series {
    pub fn url(self) -> &'static str {
        match self {
            Series::Confirmed => CONFIRMED_URL,
            Series::Deaths => DEATHS_URL,
        }
    }

    /// Name of the value column once the table is in long form.
    pub fn value_column(self) -> &'static str {
        match self {
            Series::Confirmed => "total_cases",
            Series::Deaths => "total_deaths",
        }
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Series::Confirmed => write!(f, "confirmed"),
            Series::Deaths => write!(f, "deaths"),
        }
    }
}

/// Hands back the raw CSV text of one series.
pub trait SeriesSource {
    fn fetch(&self, series: Series) -> Result<String, RetrievalError>;
}

/// Downloads the two CSVs, from GitHub unless pointed at a mirror.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    confirmed_url: String,
    deaths_url: String,
}

impl HttpSource {
    pub fn new() -> Result<Self, RetrievalError> {
        Self::with_urls(Series::Confirmed.url(), Series::Deaths.url())
    }

    pub fn with_urls(confirmed_url: &str, deaths_url: &str) -> Result<Self, RetrievalError> {
        let client = reqwest::blocking::Client::builder().build()?;
        Ok(Self {
            client,
            confirmed_url: confirmed_url.to_string(),
            deaths_url: deaths_url.to_string(),
        })
    }
}

impl SeriesSource for HttpSource {
    fn fetch(&self, series: Series) -> Result<String, RetrievalError> {
        let url = match series {
            Series::Confirmed => &self.confirmed_url,
            Series::Deaths => &self.deaths_url,
        };
        info!("fetching {} series from {}", series, url);
        let body = self
            .client
            .get(url.as_str())
            .send()?
            .error_for_status()?
            .text()?;
        info!("{} series: {} bytes", series, body.len());
        Ok(body)
    }
}

/// Reads previously downloaded copies of the two CSVs from disk.
pub struct FileSource {
    pub confirmed: PathBuf,
    pub deaths: PathBuf,
}

impl SeriesSource for FileSource {
    fn fetch(&self, series: Series) -> Result<String, RetrievalError> {
        let path = match series {
            Series::Confirmed => &self.confirmed,
            Series::Deaths => &self.deaths,
        };
        info!("reading {} series from {}", series, path.display());
        std::fs::read_to_string(path).map_err(|source| RetrievalError::Io {
            path: path.clone(),
            source,
        })
    }
}
