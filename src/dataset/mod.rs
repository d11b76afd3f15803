use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

// Column names are the external data contract shared with the scraper and
// the UI, so they keep their Spanish spelling.
pub const COL_TITLE: &str = "TituloReview";
pub const COL_REVIEW: &str = "Review";
pub const COL_DATE: &str = "Fecha";
pub const COL_RATING: &str = "Calificacion";
pub const COL_PLACE: &str = "Lugar";
pub const COL_CLEAN_TEXT: &str = "TextoLimpio";
pub const COL_SENTIMENT: &str = "Sentimiento";
pub const COL_SUBJECTIVITY: &str = "Subjetividad";
pub const COL_CATEGORIES: &str = "Categorias";
pub const COL_TOPIC: &str = "Topico";
pub const COL_KEY_PHRASE: &str = "FraseClave";

pub const SENTIMENT_POSITIVE: &str = "Positivo";
pub const SENTIMENT_NEUTRAL: &str = "Neutro";
pub const SENTIMENT_NEGATIVE: &str = "Negativo";
pub const SUBJECTIVE: &str = "Subjetiva";
pub const OBJECTIVE: &str = "Objetiva";

/// Separator inside the multi-label `Categorias` cell.
pub const CATEGORY_SEPARATOR: char = ';';

/// The shared tabular store: one header row plus string cells.
///
/// Phases load the file, grow columns, and save it back; the rollback
/// manager snapshots the file around them. All cells stay strings; the
/// CSV is the source of truth and anything numeric is parsed at the edge
/// that needs it.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Loads the full dataset. Ragged rows are an error; the store is
    /// either rectangular or corrupt.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::DatasetMissing {
                path: path.to_path_buf(),
            });
        }
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(|c| c.to_string()).collect());
        }
        Ok(Self { headers, rows })
    }

    /// Saves atomically: write a sibling temp file, then rename over the
    /// target so readers never observe a half-written store.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("csv.tmp");
        {
            let mut writer = WriterBuilder::new().from_path(&tmp)?;
            writer.write_record(&self.headers)?;
            for row in &self.rows {
                writer.write_record(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Reads only the header row. This is what idempotence predicates use;
    /// it must stay cheap on large corpora.
    pub fn read_headers(path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(PipelineError::DatasetMissing {
                path: path.to_path_buf(),
            });
        }
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
        Ok(reader.headers()?.iter().map(|h| h.to_string()).collect())
    }

    /// Header-only probe for "has phase X already added its column".
    pub fn file_has_column(path: &Path, name: &str) -> Result<bool> {
        Ok(Self::read_headers(path)?.iter().any(|h| h == name))
    }

    /// Streams the file to count data rows without keeping them. The
    /// driver compares this before and after every enrichment phase.
    pub fn count_data_rows(path: &Path) -> Result<usize> {
        if !path.exists() {
            return Err(PipelineError::DatasetMissing {
                path: path.to_path_buf(),
            });
        }
        let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut count = 0usize;
        for record in reader.records() {
            record?;
            count += 1;
        }
        Ok(count)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell accessor; `None` when the row or column does not exist.
    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx)).map(|s| s.as_str())
    }

    /// Borrowed view of one column, row order preserved.
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Adds a column, or overwrites it in place when it already exists
    /// (forced phase re-runs overwrite). The value count must match the
    /// row count exactly.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(PipelineError::Internal(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    pub fn set_value(&mut self, row: usize, column: &str, value: String) -> Result<()> {
        let idx = self
            .column_index(column)
            .ok_or_else(|| PipelineError::Internal(format!("unknown column '{}'", column)))?;
        match self.rows.get_mut(row) {
            Some(r) => {
                r[idx] = value;
                Ok(())
            }
            None => Err(PipelineError::Internal(format!("row {} out of range", row))),
        }
    }

    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.headers.len() {
            return Err(PipelineError::Internal(format!(
                "row has {} cells for {} columns",
                row.len(),
                self.headers.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Keeps only rows the predicate accepts. Only the initial cleaning
    /// phase may call this; later phases are row-count checked.
    pub fn retain_rows<F>(&mut self, mut keep: F)
    where
        F: FnMut(&[String]) -> bool,
    {
        self.rows.retain(|row| keep(row));
    }
}

/// Structural health summary for the `validate` command and the report's
/// `validacion_dataset` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetValidation {
    pub archivo_presente: bool,
    pub filas: usize,
    pub columnas: Vec<String>,
    pub columnas_duplicadas: Vec<String>,
    pub filas_irregulares: usize,
    pub valido: bool,
}

/// Checks the store file without loading it into a full `Dataset`:
/// duplicate headers and ragged rows are the corruption signals the
/// pipeline refuses to build on.
pub fn validate_file(path: &Path) -> DatasetValidation {
    if !path.exists() {
        return DatasetValidation {
            archivo_presente: false,
            filas: 0,
            columnas: Vec::new(),
            columnas_duplicadas: Vec::new(),
            filas_irregulares: 0,
            valido: false,
        };
    }

    let mut columnas = Vec::new();
    let mut columnas_duplicadas = Vec::new();
    let mut filas = 0usize;
    let mut filas_irregulares = 0usize;

    let reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path);

    match reader {
        Ok(mut reader) => {
            if let Ok(headers) = reader.headers() {
                columnas = headers.iter().map(|h| h.to_string()).collect();
                let mut seen = std::collections::HashSet::new();
                for h in &columnas {
                    if !seen.insert(h.clone()) && !columnas_duplicadas.contains(h) {
                        columnas_duplicadas.push(h.clone());
                    }
                }
            }
            let expected = columnas.len();
            for record in reader.records() {
                match record {
                    Ok(record) => {
                        filas += 1;
                        if record.len() != expected {
                            filas_irregulares += 1;
                        }
                    }
                    Err(_) => filas_irregulares += 1,
                }
            }
        }
        Err(_) => {
            return DatasetValidation {
                archivo_presente: true,
                filas: 0,
                columnas: Vec::new(),
                columnas_duplicadas: Vec::new(),
                filas_irregulares: 0,
                valido: false,
            };
        }
    }

    let valido =
        !columnas.is_empty() && columnas_duplicadas.is_empty() && filas_irregulares == 0;
    DatasetValidation {
        archivo_presente: true,
        filas,
        columnas,
        columnas_duplicadas,
        filas_irregulares,
        valido,
    }
}
