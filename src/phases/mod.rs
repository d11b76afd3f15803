use anyhow::Result;
use std::collections::BTreeMap;

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::rollback::PhaseFileMap;

pub mod categories;
pub mod clean;
pub mod export;
pub mod insights;
pub mod lexicon;
pub mod sentiment;
pub mod subjectivity;
pub mod summaries;
pub mod topics;

pub const PHASE_COUNT: u8 = 8;

/// One step of the enrichment pipeline.
///
/// Phases are pure batch transforms: load the store, derive a column or an
/// artifact, write it back. They never talk to the rollback manager; the
/// driver wraps every `apply` in a backup session.
pub trait Phase: Send + Sync {
    fn number(&self) -> u8;
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Cheap on-disk probe for "did this phase already run". Must not load
    /// the full dataset.
    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool>;

    fn apply(&self, ctx: &PhaseContext) -> Result<()>;
}

/// Everything a phase body needs: the resolved configuration plus loaders
/// for the shared store.
pub struct PhaseContext {
    pub config: PipelineConfig,
}

impl PhaseContext {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn load_dataset(&self) -> Result<Dataset> {
        Ok(Dataset::load(&self.config.dataset_path())?)
    }

    pub fn save_dataset(&self, dataset: &Dataset) -> Result<()> {
        dataset.save(&self.config.dataset_path())?;
        Ok(())
    }
}

/// The fixed phase order. Ordinals are contiguous from 1; the driver and
/// the file map both lean on that.
pub fn all_phases() -> Vec<Box<dyn Phase>> {
    vec![
        Box::new(clean::CleanText),
        Box::new(sentiment::SentimentAnalysis),
        Box::new(subjectivity::SubjectivityAnalysis),
        Box::new(categories::CategoryTagging),
        Box::new(topics::TopicModeling),
        Box::new(summaries::KeyPhraseExtraction),
        Box::new(insights::InsightGeneration),
        Box::new(export::VisualizationExport),
    ]
}

/// Declares which files each phase may touch. Every file a phase writes
/// must appear here; the rollback manager only protects what is declared.
pub fn phase_file_map(config: &PipelineConfig) -> crate::error::Result<PhaseFileMap> {
    let dataset = config.dataset_path();
    let report = config.report_path();
    let mut entries = BTreeMap::new();
    entries.insert(1, vec![dataset.clone()]);
    entries.insert(2, vec![dataset.clone(), report.clone()]);
    entries.insert(3, vec![dataset.clone()]);
    entries.insert(4, vec![dataset.clone()]);
    entries.insert(5, vec![dataset.clone(), config.topics_path()]);
    entries.insert(6, vec![dataset]);
    entries.insert(7, vec![report]);
    entries.insert(
        8,
        vec![config.viz_distributions_path(), config.viz_timeline_path()],
    );
    PhaseFileMap::new(PHASE_COUNT, entries)
}

/// Enrichment phases depend on columns produced earlier in the order; a
/// missing input column is reported with the phase that produces it.
pub(crate) fn require_column(
    dataset: &Dataset,
    column: &str,
    needed_by: u8,
    produced_by: u8,
) -> Result<()> {
    if dataset.has_column(column) {
        Ok(())
    } else {
        Err(PipelineError::MissingColumn {
            column: column.to_string(),
            needed_by,
            produced_by,
        }
        .into())
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use tempfile::TempDir;

    /// Context whose data directory lives inside the given tempdir.
    pub fn context(dir: &TempDir) -> PhaseContext {
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        PhaseContext::new(config)
    }
}
