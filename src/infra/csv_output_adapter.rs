use anyhow::Context;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::app::ports::{FusionOutputPort, TableKind};
use crate::config::OutputConfig;
use crate::error::{FusionError, Result};
use crate::pipeline::processing::rating::registry::SOURCE_SPECS;
use crate::types::FusedFilm;

/// CSV implementation of FusionOutputPort. Tables without a configured path
/// are skipped.
#[derive(Debug, Default, Clone)]
pub struct CsvFusionOutputAdapter {
    paths: BTreeMap<TableKind, PathBuf>,
}

impl CsvFusionOutputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(mut self, kind: TableKind, path: impl Into<PathBuf>) -> Self {
        self.paths.insert(kind, path.into());
        self
    }

    pub fn from_output_config(output: &OutputConfig) -> Self {
        let mut adapter = Self::new().with_path(TableKind::Final, output.final_csv_path());
        for (kind, path) in [
            (TableKind::Merged, &output.merged_csv_path),
            (TableKind::Unfiltered, &output.unfiltered_csv_path),
            (TableKind::Duplicates, &output.duplicates_csv_path),
        ] {
            if let Some(path) = path {
                adapter = adapter.with_path(kind, path.clone());
            }
        }
        adapter
    }

    pub fn path_for(&self, kind: TableKind) -> Option<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path)
    }
}

/// Header of a wide table, in output order
pub fn table_header(kind: TableKind, id_columns: &[String]) -> Vec<String> {
    let mut header: Vec<String> = ["title", "release_year", "genres"]
        .iter()
        .map(|c| c.to_string())
        .collect();
    header.extend(SOURCE_SPECS.iter().map(|spec| spec.rating_column.to_string()));
    header.push("count_ratings".to_string());
    header.extend(id_columns.iter().cloned());

    if kind.includes_normalized_columns() {
        header.extend(SOURCE_SPECS.iter().map(|spec| spec.norm_column.to_string()));
        header.extend(
            ["num_available_ratings", "superscore_mean", "superscore_median"]
                .iter()
                .map(|c| c.to_string()),
        );
    }
    if kind.includes_identity_columns() {
        header.push("norm_title".to_string());
        header.push("year_cluster".to_string());
    }
    header
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn table_row(kind: TableKind, film: &FusedFilm, id_columns: &[String]) -> Result<Vec<String>> {
    let mut row = vec![
        film.title.clone(),
        optional(film.resolved_year),
        serde_json::to_string(&film.genres)?,
    ];
    row.extend(SOURCE_SPECS.iter().map(|spec| optional(film.ratings_raw.get(spec.source))));
    row.push(film.count_ratings.to_string());
    row.extend(
        id_columns
            .iter()
            .map(|column| film.external_ids.get(column).cloned().unwrap_or_default()),
    );

    if kind.includes_normalized_columns() {
        row.extend(SOURCE_SPECS.iter().map(|spec| optional(film.ratings_norm.get(spec.source))));
        row.push(film.num_available_ratings.to_string());
        row.push(optional(film.superscore_mean));
        row.push(optional(film.superscore_median));
    }
    if kind.includes_identity_columns() {
        row.push(film.norm_title.clone());
        row.push(film.year_cluster.to_string());
    }
    Ok(row)
}

/// Render a wide table as CSV text
pub fn render_table(kind: TableKind, films: &[FusedFilm]) -> Result<Vec<u8>> {
    let id_columns: Vec<String> = films
        .iter()
        .flat_map(|film| film.external_ids.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(table_header(kind, &id_columns))?;
    for film in films {
        writer.write_record(table_row(kind, film, &id_columns)?)?;
    }
    writer
        .into_inner()
        .map_err(|e| FusionError::Io(e.into_error()))
}

#[async_trait]
impl FusionOutputPort for CsvFusionOutputAdapter {
    async fn write_table(&self, kind: TableKind, films: &[FusedFilm]) -> anyhow::Result<()> {
        let Some(path) = self.path_for(kind) else {
            debug!("No output path configured for the {} table; skipping", kind);
            return Ok(());
        };

        let bytes = render_table(kind, films)?;
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .with_context(|| format!("Failed to write {} table to {}", kind, path.display()))?;

        info!("Wrote {} table ({} rows) to {}", kind, films.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Source, SourceRatings};

    fn film() -> FusedFilm {
        let mut ratings_raw = SourceRatings::default();
        ratings_raw.set(Source::Imdb, Some(8.8));
        ratings_raw.set(Source::Metacritic, Some(74.0));
        let mut ratings_norm = SourceRatings::default();
        ratings_norm.set(Source::Imdb, Some(8.8));
        ratings_norm.set(Source::Metacritic, Some(7.4));

        FusedFilm {
            norm_title: "inception".to_string(),
            title: "Inception".to_string(),
            year_cluster: 0,
            resolved_year: Some(2010),
            genres: vec!["Action".to_string(), "Sci-Fi".to_string()],
            external_ids: [("ID_IMDB".to_string(), "tt1375666".to_string())]
                .into_iter()
                .collect(),
            ratings_raw,
            ratings_norm,
            count_ratings: 2,
            num_available_ratings: 2,
            superscore_mean: Some(8.1),
            superscore_median: Some(8.1),
        }
    }

    #[test]
    fn test_final_header_order() {
        let header = table_header(TableKind::Final, &["ID_IMDB".to_string()]);
        assert_eq!(
            header,
            vec![
                "title",
                "release_year",
                "genres",
                "rating_imdb",
                "rating_movielens",
                "rating_metacritic",
                "rating_rt_audience",
                "count_ratings",
                "ID_IMDB",
                "imdb_norm",
                "movielens_norm",
                "metacritic_norm",
                "rt_norm",
                "num_available_ratings",
                "superscore_mean",
                "superscore_median",
            ]
        );
    }

    #[test]
    fn test_unfiltered_header_adds_identity_columns() {
        let header = table_header(TableKind::Unfiltered, &[]);
        assert_eq!(header.len(), 10);
        assert_eq!(&header[8..], ["norm_title", "year_cluster"]);
        assert!(!header.contains(&"imdb_norm".to_string()));
    }

    #[test]
    fn test_render_writes_missing_values_as_empty_cells() {
        let bytes = render_table(TableKind::Merged, &[film()]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next(),
            Some("title,release_year,genres,rating_imdb,rating_movielens,rating_metacritic,rating_rt_audience,count_ratings,ID_IMDB")
        );
        assert_eq!(
            lines.next(),
            Some("Inception,2010,\"[\"\"Action\"\",\"\"Sci-Fi\"\"]\",8.8,,74,,2,tt1375666")
        );
    }

    #[tokio::test]
    async fn test_write_table_creates_parent_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("processed/final.csv");
        let adapter = CsvFusionOutputAdapter::new().with_path(TableKind::Final, &path);

        adapter.write_table(TableKind::Final, &[film()]).await?;
        // No path configured: silently skipped
        adapter.write_table(TableKind::Duplicates, &[film()]).await?;

        let mut reader = csv::Reader::from_path(&path)?;
        let headers = reader.headers()?.clone();
        let record = reader.records().next().unwrap()?;
        let mean_idx = headers.iter().position(|h| h == "superscore_mean").unwrap();
        assert_eq!(&record[mean_idx], "8.1");
        Ok(())
    }
}
