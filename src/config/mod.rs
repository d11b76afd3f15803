use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Resolved settings for one pipeline installation.
///
/// Every key has a default, so a missing config file means "run with
/// defaults in ./data". All artifact paths are resolved relative to
/// `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub data_dir: PathBuf,
    pub dataset_file: String,
    pub report_file: String,
    pub topics_file: String,
    pub viz_dir: String,
    pub backup_dir: String,
    /// Number of topic clusters phase 5 builds.
    pub topic_count: usize,
    /// Minimum mentions before a category shows up in strengths/weaknesses.
    pub min_category_mentions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            name: "tourism-reviews".to_string(),
            data_dir: PathBuf::from("data"),
            dataset_file: "dataset.csv".to_string(),
            report_file: "informe_insights.json".to_string(),
            topics_file: "topicos.json".to_string(),
            viz_dir: "viz".to_string(),
            backup_dir: ".backups".to_string(),
            topic_count: 5,
            min_category_mentions: 3,
        }
    }
}

impl PipelineConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            PipelineError::Config(format!(
                "failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::Config("pipeline name is empty".to_string()));
        }
        if !self.dataset_file.ends_with(".csv") {
            return Err(PipelineError::Config(format!(
                "dataset_file must be a .csv file, got '{}'",
                self.dataset_file
            )));
        }
        if self.topic_count < 2 {
            return Err(PipelineError::Config(format!(
                "topic_count must be at least 2, got {}",
                self.topic_count
            )));
        }
        if self.min_category_mentions == 0 {
            return Err(PipelineError::Config(
                "min_category_mentions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    // Resolved artifact paths. Everything the pipeline touches lives under
    // data_dir so one directory holds the whole installation.

    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join(&self.dataset_file)
    }

    pub fn report_path(&self) -> PathBuf {
        self.data_dir.join(&self.report_file)
    }

    pub fn topics_path(&self) -> PathBuf {
        self.data_dir.join(&self.topics_file)
    }

    pub fn viz_path(&self) -> PathBuf {
        self.data_dir.join(&self.viz_dir)
    }

    pub fn viz_distributions_path(&self) -> PathBuf {
        self.viz_path().join("distribuciones.json")
    }

    pub fn viz_timeline_path(&self) -> PathBuf {
        self.viz_path().join("serie_temporal.json")
    }

    pub fn backup_root(&self) -> PathBuf {
        self.data_dir.join(&self.backup_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.dataset_path(), PathBuf::from("data/dataset.csv"));
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config = PipelineConfig::from_yaml_str(
            "name: playas-del-sur\ndata_dir: /srv/reviews\ntopic_count: 3\n",
        )
        .unwrap();
        assert_eq!(config.name, "playas-del-sur");
        assert_eq!(config.topic_count, 3);
        assert_eq!(config.dataset_file, "dataset.csv");
        assert_eq!(
            config.report_path(),
            PathBuf::from("/srv/reviews/informe_insights.json")
        );
    }

    #[test]
    fn rejects_non_csv_dataset() {
        let err = PipelineConfig::from_yaml_str("dataset_file: dataset.parquet\n").unwrap_err();
        assert!(err.to_string().contains(".csv"));
    }

    #[test]
    fn rejects_tiny_topic_count() {
        let err = PipelineConfig::from_yaml_str("topic_count: 1\n").unwrap_err();
        assert!(err.to_string().contains("topic_count"));
    }
}
