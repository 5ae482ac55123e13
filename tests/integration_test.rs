use anyhow::Result;
use film_fusion::app::fusion_use_case::FusionUseCase;
use film_fusion::config::Config;
use film_fusion::infra::csv_output_adapter::CsvFusionOutputAdapter;
use film_fusion::infra::csv_source_adapter::CsvSourceAdapter;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

const IMDB_CSV: &str = "\
ID_IMDB,title,year,genres,rating_imdb
tt1375666,Inception (2010),,\"['Action', 'Sci-Fi']\",8.8
tt0113277,Heat,1995,Crime,8.3
tt0078748,Alien,1979,Horror,8.5
";

const MOVIELENS_CSV: &str = "\
title,year,genres,rating_movielens
Inception,2010,Action|Sci-Fi,4.1
Heat,1995,Crime,4.0
Solo Film,2001,Drama,3.5
";

const METACRITIC_CSV: &str = "\
title,release_date,rating_metacritic
Inception,2010-07-16,74
Alien,25.05.1979,89
";

// Older export with the legacy Rotten Tomatoes column name
const RT_CSV: &str = "\
title,year,tomatometer_rating
Heat,1995,86
";

fn write_fixtures(dir: &Path, processing: &str) -> Result<Config> {
    std::fs::create_dir_all(dir.join("raw"))?;
    std::fs::write(dir.join("raw/imdb.csv"), IMDB_CSV)?;
    std::fs::write(dir.join("raw/movielens.csv"), MOVIELENS_CSV)?;
    std::fs::write(dir.join("raw/metacritic.csv"), METACRITIC_CSV)?;
    std::fs::write(dir.join("raw/rt.csv"), RT_CSV)?;

    let config = format!(
        r#"
[[sources]]
name = "imdb"
path = "raw/imdb.csv"

[[sources]]
name = "movielens"
path = "raw/movielens.csv"

[[sources]]
name = "metacritic"
path = "raw/metacritic.csv"

[[sources]]
name = "rt"
path = "raw/rt.csv"

{processing}

[output]
merged_csv_path = "processed/merged_movies.csv"
unfiltered_csv_path = "processed/all_movies_wide_unfiltered.csv"
duplicates_csv_path = "processed/duplicates/merged_duplicates.csv"
"#
    );
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, config)?;
    Ok(Config::load(&config_path)?)
}

fn use_case(config: &Config) -> FusionUseCase {
    FusionUseCase::from_config(
        config,
        Arc::new(CsvSourceAdapter::new()),
        Arc::new(CsvFusionOutputAdapter::from_output_config(&config.output)),
    )
}

/// Rows of a CSV file keyed by header name
fn read_rows(path: &Path) -> Result<Vec<HashMap<String, String>>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .zip(record.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
        );
    }
    Ok(rows)
}

#[tokio::test]
async fn test_end_to_end_fusion_from_csv() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = write_fixtures(
        temp_dir.path(),
        "[processing]\napply_outlier_treatment = false",
    )?;

    let summary = use_case(&config).run(&config.sources).await?;

    assert_eq!(summary.tables_loaded, 4);
    assert_eq!(summary.observations, 9);
    assert_eq!(summary.fusion.resolved_films, 4);
    assert_eq!(summary.fusion.retained, 3);
    assert_eq!(summary.final_rows, 3);

    let rows = read_rows(&config.output.final_csv_path())?;
    let titles: Vec<&str> = rows.iter().map(|r| r["title"].as_str()).collect();
    // Rating count descending, then newest first
    assert_eq!(titles, vec!["Inception (2010)", "Heat", "Alien"]);

    let inception = &rows[0];
    assert_eq!(inception["release_year"], "2010");
    assert_eq!(inception["count_ratings"], "3");
    assert_eq!(inception["rating_metacritic"], "74");
    assert_eq!(inception["metacritic_norm"], "7.4");
    assert_eq!(inception["ID_IMDB"], "tt1375666");
    assert_eq!(inception["genres"], "[\"Action\",\"Sci-Fi\"]");

    let heat = &rows[1];
    assert_eq!(heat["rating_rt_audience"], "86");
    assert_eq!(heat["num_available_ratings"], "3");
    let mean: f64 = heat["superscore_mean"].parse()?;
    assert!((mean - 8.3).abs() < 1e-9);

    let unfiltered = read_rows(&config.output.unfiltered_csv_path.clone().unwrap())?;
    assert_eq!(unfiltered.len(), 4);
    assert!(unfiltered.iter().any(|r| r["norm_title"] == "solo film"));

    // No duplicate identities, so no duplicates diagnostic
    assert!(!config.output.duplicates_csv_path.clone().unwrap().exists());
    Ok(())
}

#[tokio::test]
async fn test_single_source_films_reach_merged_but_not_final() -> Result<()> {
    let temp_dir = tempdir()?;
    let config = write_fixtures(
        temp_dir.path(),
        "[processing]\nmin_ratings_for_fusion = 1\nmin_ratings_for_superscore = 2",
    )?;

    let summary = use_case(&config).run(&config.sources).await?;

    assert_eq!(summary.fusion.retained, 4);
    assert_eq!(summary.final_rows, 3);

    let merged = read_rows(&config.output.merged_csv_path.clone().unwrap())?;
    assert_eq!(merged.len(), 4);
    assert_eq!(merged[3]["title"], "Solo Film");
    assert!(!merged[0].contains_key("superscore_mean"));
    Ok(())
}

#[tokio::test]
async fn test_unreadable_tables_are_skipped() -> Result<()> {
    let temp_dir = tempdir()?;
    let mut config = write_fixtures(temp_dir.path(), "")?;

    // A table without any rating column cannot be used
    let broken = temp_dir.path().join("raw/broken.csv");
    std::fs::write(&broken, "title,year\nHeat,1995\n")?;
    config.sources[0].path = broken;

    let summary = use_case(&config).run(&config.sources).await?;
    assert_eq!(summary.tables_failed, 1);
    assert_eq!(summary.tables_loaded, 3);

    // Inception now has only Movielens and Metacritic ratings
    let rows = read_rows(&config.output.final_csv_path())?;
    let inception = rows.iter().find(|r| r["title"] == "Inception").unwrap();
    assert_eq!(inception["count_ratings"], "2");
    assert_eq!(inception["rating_imdb"], "");

    for source in &mut config.sources {
        source.path = temp_dir.path().join("raw/missing.csv");
    }
    assert!(use_case(&config).run(&config.sources).await.is_err());
    Ok(())
}
