//! Incremental product discovery over a date range.
//!
//! The catalog only returns a bounded page of records per query, so the search
//! window is walked forward: after each page the window start moves to the day
//! after the last acquisition seen, until the window closes or a query comes
//! back empty.
use crate::error::FetchError;
use crate::geo::BoundingBox;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

const WINDOW_DATE_FORMAT: &str = "%Y-%m-%d";

/// Accepted acquisition date shapes, tried in order.
static ACQUISITION_DATE_FORMATS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"^\d{6}$", "%y%m%d"),
        (r"^\d{8}$", "%Y%m%d"),
        (r"^\d{4}-\d{2}-\d{2}$", "%Y-%m-%d"),
    ]
    .into_iter()
    .map(|(shape, format)| {
        let re = Regex::new(shape).expect("Regex pattern should always compile");
        (re, format)
    })
    .collect()
});

/// Half-open `[start, end)` interval of acquisition dates still to be searched.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SearchWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Build a window from two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, FetchError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, WINDOW_DATE_FORMAT).map_err(|err| {
                FetchError::Validation(format!("Invalid window date '{s}': {err}"))
            })
        };
        Ok(Self::new(parse(start)?, parse(end)?))
    }

    pub fn is_open(&self) -> bool {
        self.start < self.end
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub name: String,
    pub acquisition_date: String,
}

impl ProductRecord {
    pub fn new(name: &str, acquisition_date: &str) -> Self {
        Self {
            name: name.to_string(),
            acquisition_date: acquisition_date.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchQuery<'a> {
    pub product_type: &'a str,
    pub bbox: &'a BoundingBox,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A catalog able to answer one windowed product query.
pub trait CatalogSearch {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<ProductRecord>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Drop names already returned by an earlier window.
    pub deduplicate: bool,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(WINDOW_DATE_FORMAT).to_string()
}

/// Parse an acquisition date as reported by the catalog.
///
/// Only the first ten characters are considered, so full timestamps such as
/// `2021-04-01T13:02:11.000Z` reduce to their date part.
pub fn parse_acquisition_date(raw: &str) -> Result<NaiveDate, FetchError> {
    let date = raw.get(..10).unwrap_or(raw);
    for (shape, format) in ACQUISITION_DATE_FORMATS.iter() {
        if shape.is_match(date) {
            return NaiveDate::parse_from_str(date, format).map_err(|err| {
                FetchError::Validation(format!("Invalid acquisition date '{raw}': {err}"))
            });
        }
    }
    Err(FetchError::Validation(format!(
        "Unrecognized acquisition date format: '{raw}'"
    )))
}

pub fn next_window_start(last_seen: NaiveDate) -> Result<NaiveDate, FetchError> {
    last_seen
        .succ_opt()
        .ok_or_else(|| FetchError::Validation(format!("No date after {last_seen}")))
}

/// Walk `window` forward and collect the names of every matching product.
pub async fn discover(
    provider: &impl CatalogSearch,
    mut window: SearchWindow,
    bbox: &BoundingBox,
    product_type: &str,
    options: &DiscoveryOptions,
) -> Result<Vec<String>, FetchError> {
    let mut names: Vec<String> = vec![];
    let mut seen: HashSet<String> = HashSet::new();

    while window.is_open() {
        let query = SearchQuery {
            product_type,
            bbox,
            start: window.start,
            end: window.end,
        };
        debug!(
            start = %format_date(window.start),
            end = %format_date(window.end),
            "Querying catalog"
        );
        let records = provider.search(&query).await?;

        let Some(last) = records.last() else {
            info!("No new results found, stopping search");
            break;
        };
        let last_date = parse_acquisition_date(&last.acquisition_date)?;

        let page_size = records.len();
        for record in records {
            if !options.deduplicate || seen.insert(record.name.clone()) {
                names.push(record.name);
            }
        }

        let next_start = next_window_start(last_date)?;
        if next_start <= window.start {
            warn!(
                start = %format_date(window.start),
                last_seen = %format_date(last_date),
                "Window did not advance, stopping search"
            );
            break;
        }
        debug!(page_size, next_start = %format_date(next_start), "Advancing window");
        window.start = next_start;
    }

    info!(total = names.len(), "Products found for the requested area");
    Ok(names)
}

/// Validate raw coordinates, then run [`discover`].
pub async fn discover_from_coordinates(
    provider: &impl CatalogSearch,
    window: SearchWindow,
    coordinates: &[f64],
    product_type: &str,
    options: &DiscoveryOptions,
) -> Result<Vec<String>, FetchError> {
    let bbox = BoundingBox::from_coordinates(coordinates)?;
    discover(provider, window, &bbox, product_type, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedCatalog;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn bbox() -> BoundingBox {
        BoundingBox::from_coordinates(&[-44.06, -23.10, -43.59, -22.89]).unwrap()
    }

    #[test]
    fn test_parse_acquisition_date_formats() {
        let expected = date("2021-04-01");
        assert_eq!(parse_acquisition_date("210401").unwrap(), expected);
        assert_eq!(parse_acquisition_date("20210401").unwrap(), expected);
        assert_eq!(parse_acquisition_date("2021-04-01").unwrap(), expected);
        assert_eq!(
            parse_acquisition_date("2021-04-01T13:02:11.000Z").unwrap(),
            expected
        );
    }

    #[test]
    fn test_date_formats_are_compiled_once() {
        let first = ACQUISITION_DATE_FORMATS.as_ptr();
        parse_acquisition_date("20210401").unwrap();
        parse_acquisition_date("2021-04-01").unwrap();
        assert_eq!(ACQUISITION_DATE_FORMATS.as_ptr(), first);
        let formats: Vec<_> = ACQUISITION_DATE_FORMATS.iter().map(|(_, f)| *f).collect();
        assert_eq!(formats, vec!["%y%m%d", "%Y%m%d", "%Y-%m-%d"]);
    }

    #[test]
    fn test_parse_acquisition_date_rejects_other_shapes() {
        for raw in ["2021/04/01", "1April", "2104", "", "20211301"] {
            let err = parse_acquisition_date(raw).unwrap_err();
            assert!(matches!(err, FetchError::Validation(_)), "{raw}");
        }
    }

    #[test]
    fn test_next_window_start() {
        assert_eq!(format_date(next_window_start(date("2021-04-30")).unwrap()), "2021-05-01");
        assert_eq!(format_date(next_window_start(date("2020-12-31")).unwrap()), "2021-01-01");
    }

    #[test]
    fn test_window_parse() {
        let window = SearchWindow::parse("2021-04-01", "2021-05-01").unwrap();
        assert!(window.is_open());
        assert!(SearchWindow::parse("2021-04-01", "01/05/2021").is_err());
    }

    #[tokio::test]
    async fn test_empty_first_query_returns_empty_list() {
        let catalog = ScriptedCatalog::new(vec![vec![]]);
        let window = SearchWindow::parse("2021-04-01", "2021-04-03").unwrap();
        let names = discover(&catalog, window, &bbox(), "S3_EFR", &DiscoveryOptions::default())
            .await
            .unwrap();
        assert!(names.is_empty());
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_window_advances_past_last_record() {
        let catalog = ScriptedCatalog::new(vec![
            vec![
                ProductRecord::new("A", "2021-04-01T10:00:00Z"),
                ProductRecord::new("B", "2021-04-03T10:00:00Z"),
            ],
            vec![ProductRecord::new("C", "20210410")],
            vec![],
        ]);
        let window = SearchWindow::parse("2021-04-01", "2021-05-01").unwrap();
        let names = discover(&catalog, window, &bbox(), "S3_EFR", &DiscoveryOptions::default())
            .await
            .unwrap();

        assert_eq!(names, vec!["A", "B", "C"]);
        let starts: Vec<_> = catalog.queries().iter().map(|(s, _)| format_date(*s)).collect();
        assert_eq!(starts, vec!["2021-04-01", "2021-04-04", "2021-04-11"]);
        assert!(catalog.queries().iter().all(|(_, e)| *e == date("2021-05-01")));
    }

    #[tokio::test]
    async fn test_stops_when_window_closes() {
        let catalog = ScriptedCatalog::new(vec![
            vec![ProductRecord::new("A", "2021-04-02")],
            vec![ProductRecord::new("unreachable", "2021-04-03")],
        ]);
        let window = SearchWindow::parse("2021-04-01", "2021-04-03").unwrap();
        let names = discover(&catalog, window, &bbox(), "S3_EFR", &DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(names, vec!["A"]);
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_deduplicates_across_windows() {
        let records = vec![
            ProductRecord::new("A", "2021-04-01"),
            ProductRecord::new("B", "2021-04-02"),
        ];
        let catalog = ScriptedCatalog::new(vec![
            records.clone(),
            vec![ProductRecord::new("B", "2021-04-02"), ProductRecord::new("C", "2021-04-05")],
            vec![],
        ]);
        let window = SearchWindow::parse("2021-04-01", "2021-05-01").unwrap();
        let names = discover(&catalog, window, &bbox(), "S3_EFR", &DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(names, vec!["A", "B", "C"]);

        let catalog = ScriptedCatalog::new(vec![
            records,
            vec![ProductRecord::new("B", "2021-04-02"), ProductRecord::new("C", "2021-04-05")],
            vec![],
        ]);
        let options = DiscoveryOptions { deduplicate: false };
        let names = discover(&catalog, window, &bbox(), "S3_EFR", &options)
            .await
            .unwrap();
        assert_eq!(names, vec!["A", "B", "B", "C"]);
    }

    #[tokio::test]
    async fn test_non_advancing_window_terminates() {
        // The provider keeps answering with a product older than the window start.
        let stale = vec![ProductRecord::new("OLD", "2021-03-01")];
        let catalog = ScriptedCatalog::new(vec![stale.clone(), stale.clone(), stale]);
        let window = SearchWindow::parse("2021-04-01", "2021-05-01").unwrap();
        let names = discover(&catalog, window, &bbox(), "S3_EFR", &DiscoveryOptions::default())
            .await
            .unwrap();
        assert_eq!(names, vec!["OLD"]);
        assert_eq!(catalog.queries().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_date_is_fatal() {
        let catalog = ScriptedCatalog::new(vec![vec![ProductRecord::new("A", "April 1st")]]);
        let window = SearchWindow::parse("2021-04-01", "2021-05-01").unwrap();
        let err = discover(&catalog, window, &bbox(), "S3_EFR", &DiscoveryOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
    }

    #[tokio::test]
    async fn test_invalid_coordinates_fail_before_any_query() {
        let catalog = ScriptedCatalog::new(vec![vec![ProductRecord::new("A", "2021-04-01")]]);
        let window = SearchWindow::parse("2021-04-01", "2021-05-01").unwrap();
        let err = discover_from_coordinates(
            &catalog,
            window,
            &[1.0, 2.0, 3.0],
            "S3_EFR",
            &DiscoveryOptions::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, FetchError::Validation(_)));
        assert!(catalog.queries().is_empty());
    }
}
