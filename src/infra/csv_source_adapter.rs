use anyhow::Context;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info, warn};

use crate::app::ports::SourceTablePort;
use crate::config::SourceConfig;
use crate::error::{FusionError, Result};
use crate::observability::metrics;
use crate::pipeline::processing::rating::parse_rating;
use crate::pipeline::processing::rating::registry::{detect_rating_column, is_id_column, spec_for};
use crate::types::{Observation, Source, SourceTable};

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y"];

/// Reads canonical per-source CSV tables from disk
#[derive(Debug, Default, Clone)]
pub struct CsvSourceAdapter;

/// Column positions resolved from a table header
#[derive(Debug)]
struct ColumnLayout {
    source: Source,
    title: usize,
    rating: usize,
    year: Option<usize>,
    release_date: Option<usize>,
    genres: Option<usize>,
    ids: Vec<(usize, String)>,
}

impl ColumnLayout {
    fn from_headers(table: &str, headers: &StringRecord, explicit: Option<Source>) -> Result<Self> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let title = position("title").ok_or_else(|| FusionError::MissingColumn {
            table: table.to_string(),
            column: "title".to_string(),
        })?;

        let (rating, source) = match explicit {
            Some(source) => {
                let spec = spec_for(source);
                let idx = position(spec.rating_column)
                    .or_else(|| spec.legacy_rating_columns.iter().find_map(|c| position(*c)))
                    .ok_or_else(|| FusionError::MissingColumn {
                        table: table.to_string(),
                        column: spec.rating_column.to_string(),
                    })?;
                (idx, source)
            }
            None => detect_rating_column(headers.iter()).ok_or_else(|| FusionError::MissingColumn {
                table: table.to_string(),
                column: "rating_<source>".to_string(),
            })?,
        };

        let genres = position("genres").or_else(|| headers.iter().position(|h| h.starts_with("genres")));
        let ids = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| is_id_column(h))
            .map(|(idx, h)| (idx, h.to_string()))
            .collect();

        Ok(Self {
            source,
            title,
            rating,
            year: position("year"),
            release_date: position("release_date"),
            genres,
            ids,
        })
    }
}

impl CsvSourceAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Parse one table. Malformed cells become nulls with a warning; only a
    /// header without a title or rating column is an error.
    pub fn parse_table(&self, name: &str, explicit: Option<Source>, content: &str) -> Result<SourceTable> {
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let headers = reader.headers()?.clone();
        let layout = ColumnLayout::from_headers(name, &headers, explicit)?;
        debug!("Column layout for '{}': {:?}", name, layout);

        let mut observations = Vec::new();
        let mut coerced = 0usize;
        let mut skipped = 0usize;

        for (row, record) in reader.records().enumerate() {
            // Header is line 1
            let line = row + 2;
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping unreadable row {} in '{}': {}", line, name, e);
                    skipped += 1;
                    continue;
                }
            };

            let cell = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

            let title = cell(Some(layout.title)).to_string();
            let rating_cell = cell(Some(layout.rating));
            let rating = parse_rating(rating_cell);
            if rating.is_none() && !rating_cell.is_empty() {
                warn!("Row {} in '{}': non-numeric rating {:?} treated as missing", line, name, rating_cell);
                coerced += 1;
            }

            if title.is_empty() && rating.is_none() {
                skipped += 1;
                continue;
            }

            let year_cell = cell(layout.year);
            let mut year = parse_year(year_cell);
            if year.is_none() && !year_cell.is_empty() {
                warn!("Row {} in '{}': unparsable year {:?} treated as missing", line, name, year_cell);
                coerced += 1;
            }

            let date_cell = cell(layout.release_date);
            let release_date = parse_release_date(date_cell);
            if release_date.is_none() && !date_cell.is_empty() {
                warn!("Row {} in '{}': unparsable release_date {:?} treated as missing", line, name, date_cell);
                coerced += 1;
            }
            if year.is_none() {
                year = release_date.map(|d| d.year());
            }

            let mut observation = Observation::new(title, layout.source).with_genres(parse_genres(cell(layout.genres)));
            observation.year = year;
            observation.release_date = release_date;
            observation.rating = rating;
            for (idx, column) in &layout.ids {
                if let Some(value) = record.get(*idx).filter(|v| !v.is_empty()) {
                    observation.external_ids.insert(column.clone(), value.to_string());
                }
            }
            observations.push(observation);
        }

        if skipped > 0 {
            debug!("Skipped {} rows without title or rating in '{}'", skipped, name);
        }
        metrics::sources::cells_coerced(layout.source.as_str(), coerced);
        info!(
            "Parsed '{}' as {} ({} rows, {} cells coerced to null)",
            name,
            layout.source,
            observations.len(),
            coerced
        );

        Ok(SourceTable {
            name: name.to_string(),
            source: layout.source,
            observations,
        })
    }
}

#[async_trait]
impl SourceTablePort for CsvSourceAdapter {
    async fn load(&self, source: &SourceConfig) -> anyhow::Result<SourceTable> {
        let explicit = match &source.source {
            Some(name) => Some(Source::from_name(name).ok_or_else(|| FusionError::UnknownSource(name.clone()))?),
            None => None,
        };

        let content = tokio::fs::read_to_string(&source.path)
            .await
            .with_context(|| format!("Failed to read source table {}", source.path.display()))?;

        let table = self
            .parse_table(&source.name, explicit, &content)
            .with_context(|| format!("Failed to parse source table {}", source.path.display()))?;
        Ok(table)
    }
}

/// Integer years, also written as floats (`2010.0`) by dataframe exports
fn parse_year(cell: &str) -> Option<i32> {
    if cell.is_empty() {
        return None;
    }
    if let Ok(year) = cell.parse::<i32>() {
        return Some(year);
    }
    cell.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < 10_000.0)
        .map(|v| v as i32)
}

fn parse_release_date(cell: &str) -> Option<NaiveDate> {
    if cell.is_empty() {
        return None;
    }
    // Timestamps keep only their date part
    let date_part = cell.split(&['T', ' '][..]).next().unwrap_or(cell);
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date_part, format).ok())
}

/// Genre cells come as JSON arrays, Python list literals or `|`/`,`
/// separated strings
pub fn parse_genres(cell: &str) -> Vec<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Vec::new();
    }

    if cell.starts_with('[') {
        if let Ok(genres) = serde_json::from_str::<Vec<String>>(cell) {
            return clean_genres(genres);
        }
        let inner = cell.trim_start_matches('[').trim_end_matches(']');
        return clean_genres(
            inner
                .split(',')
                .map(|g| g.trim().trim_matches(|c| c == '\'' || c == '"').to_string()),
        );
    }

    let separator = if cell.contains('|') { '|' } else { ',' };
    clean_genres(cell.split(separator).map(str::to_string))
}

fn clean_genres<I>(genres: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    genres
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect()
}
