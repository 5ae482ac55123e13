use async_trait::async_trait;
use std::fmt;

use crate::config::SourceConfig;
use crate::types::{FusedFilm, SourceTable};

/// Loads one configured per-source table
#[async_trait]
pub trait SourceTablePort: Send + Sync {
    async fn load(&self, source: &SourceConfig) -> anyhow::Result<SourceTable>;
}

/// The wide tables a run produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    /// Every fused film before the retention gate, with identity columns
    Unfiltered,
    /// Retained rows sharing `(norm_title, resolved_year)` with another row
    Duplicates,
    /// Retained films as fused, before rating normalization
    Merged,
    /// Normalized films with enough ratings for a superscore
    Final,
}

impl TableKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableKind::Unfiltered => "unfiltered",
            TableKind::Duplicates => "duplicates",
            TableKind::Merged => "merged",
            TableKind::Final => "final",
        }
    }

    /// Whether the table carries `norm_title` and `year_cluster`
    pub fn includes_identity_columns(&self) -> bool {
        matches!(self, TableKind::Unfiltered | TableKind::Duplicates)
    }

    /// Whether the table carries normalized ratings and superscores
    pub fn includes_normalized_columns(&self) -> bool {
        matches!(self, TableKind::Final)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persists the wide tables of a run
#[async_trait]
pub trait FusionOutputPort: Send + Sync {
    async fn write_table(&self, kind: TableKind, films: &[FusedFilm]) -> anyhow::Result<()>;
}
