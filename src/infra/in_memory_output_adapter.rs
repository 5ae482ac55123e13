use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use crate::app::ports::{FusionOutputPort, TableKind};
use crate::types::FusedFilm;

/// In-memory implementation of FusionOutputPort; keeps the last table written
/// per kind
#[derive(Default)]
pub struct InMemoryFusionOutputAdapter {
    tables: Mutex<BTreeMap<TableKind, Vec<FusedFilm>>>,
}

impl InMemoryFusionOutputAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn table(&self, kind: TableKind) -> Option<Vec<FusedFilm>> {
        self.tables.lock().await.get(&kind).cloned()
    }

    pub async fn written_kinds(&self) -> Vec<TableKind> {
        self.tables.lock().await.keys().copied().collect()
    }
}

#[async_trait]
impl FusionOutputPort for InMemoryFusionOutputAdapter {
    async fn write_table(&self, kind: TableKind, films: &[FusedFilm]) -> anyhow::Result<()> {
        self.tables.lock().await.insert(kind, films.to_vec());
        Ok(())
    }
}
