use tracing::warn;

use crate::prepare::{self, PreparedTable};
use crate::source::{RetrievalError, SeriesSource};

/// Holds the one prepared table the presenter reads from.
#[derive(Debug, Default)]
pub struct Session {
    table: Option<PreparedTable>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh table and swaps it in. On failure the previous table,
    /// if any, is kept.
    pub fn load(
        &mut self,
        source: &dyn SeriesSource,
        region: &str,
    ) -> Result<&PreparedTable, RetrievalError> {
        let table = prepare::load(source, region).map_err(|e| {
            warn!("load for {} failed: {}", region, e);
            e
        })?;
        if table.is_empty() {
            warn!("{} not present in both series; nothing to show", region);
        }
        Ok(&*self.table.insert(table))
    }

    /// The loaded table, or `None` if nothing usable has been loaded yet.
    pub fn table(&self) -> Option<&PreparedTable> {
        self.table.as_ref().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::source::Series;

    /// Serves fixed CSV text, or fails every fetch when `fail` is set.
    pub(crate) struct StaticSource {
        pub confirmed: String,
        pub deaths: String,
        pub fail: bool,
    }

    impl StaticSource {
        pub(crate) fn new(confirmed: &str, deaths: &str) -> Self {
            Self {
                confirmed: confirmed.to_string(),
                deaths: deaths.to_string(),
                fail: false,
            }
        }
    }

    impl SeriesSource for StaticSource {
        fn fetch(&self, series: Series) -> Result<String, RetrievalError> {
            if self.fail {
                return Err(RetrievalError::Io {
                    path: series.url().into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "offline"),
                });
            }
            Ok(match series {
                Series::Confirmed => self.confirmed.clone(),
                Series::Deaths => self.deaths.clone(),
            })
        }
    }

    #[test]
    fn nothing_loaded_is_not_ready() {
        assert!(Session::new().table().is_none());
    }

    #[test]
    fn load_installs_table() {
        let source = StaticSource::new(
            "Country/Region,1/22/20,1/23/20\nUS,1,3\n",
            "Country/Region,1/22/20,1/23/20\nUS,0,1\n",
        );
        let mut session = Session::new();
        assert_eq!(session.load(&source, "US").unwrap().len(), 2);
        assert_eq!(session.table().map(|t| t.len()), Some(2));
    }

    #[test]
    fn failed_load_keeps_previous_table() {
        let mut source = StaticSource::new(
            "Country/Region,1/22/20\nUS,1\n",
            "Country/Region,1/22/20\nUS,0\n",
        );
        let mut session = Session::new();
        session.load(&source, "US").unwrap();

        source.fail = true;
        assert!(session.load(&source, "US").is_err());
        assert_eq!(session.table().map(|t| t.len()), Some(1));

        source.fail = false;
        source.deaths = "Country/Region,1/22/20\nUS,oops\n".to_string();
        assert!(matches!(
            session.load(&source, "US"),
            Err(RetrievalError::BadValue { .. })
        ));
        assert_eq!(session.table().map(|t| t.len()), Some(1));
    }

    #[test]
    fn absent_region_replaces_table_with_not_ready() {
        let source = StaticSource::new(
            "Country/Region,1/22/20\nUS,1\n",
            "Country/Region,1/22/20\nUS,0\n",
        );
        let mut session = Session::new();
        session.load(&source, "US").unwrap();
        assert!(session.load(&source, "Atlantis").unwrap().is_empty());
        assert!(session.table().is_none());
    }
}
