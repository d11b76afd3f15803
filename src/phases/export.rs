use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Phase, PhaseContext};
use crate::dataset::{
    Dataset, COL_DATE, COL_SENTIMENT, COL_SUBJECTIVITY, SENTIMENT_NEGATIVE, SENTIMENT_POSITIVE,
};
use crate::report::{
    self, category_counts, parse_review_date, rating_stats, single_value_counts, ValueCounts,
};

/// Phase 8: flattens the enriched dataset into the two JSON files the
/// chart layer reads. Like the report, missing columns surface as `null`
/// rather than as absent keys.
pub struct VisualizationExport;

/// Contents of `viz/distribuciones.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionsFile {
    pub generado: String,
    pub sentimiento: Option<ValueCounts>,
    pub subjetividad: Option<ValueCounts>,
    pub categorias: Option<ValueCounts>,
    pub calificacion: Option<BTreeMap<String, usize>>,
}

/// Contents of `viz/serie_temporal.json`, keyed by `YYYY-MM`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineFile {
    pub generado: String,
    pub meses: BTreeMap<String, MonthBucket>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthBucket {
    pub total: usize,
    pub positivas: Option<usize>,
    pub negativas: Option<usize>,
}

pub fn distributions(dataset: &Dataset) -> DistributionsFile {
    DistributionsFile {
        generado: Utc::now().to_rfc3339(),
        sentimiento: single_value_counts(dataset, COL_SENTIMENT),
        subjetividad: single_value_counts(dataset, COL_SUBJECTIVITY),
        categorias: category_counts(dataset),
        calificacion: rating_stats(dataset).map(|r| r.distribucion),
    }
}

pub fn timeline(dataset: &Dataset) -> TimelineFile {
    let mut meses: BTreeMap<String, MonthBucket> = BTreeMap::new();
    let sentiments = dataset.column(COL_SENTIMENT);
    if let Some(dates) = dataset.column(COL_DATE) {
        for (row, raw) in dates.iter().enumerate() {
            let date = match parse_review_date(raw) {
                Some(date) => date,
                None => continue,
            };
            let bucket = meses
                .entry(date.format("%Y-%m").to_string())
                .or_insert(MonthBucket {
                    total: 0,
                    positivas: sentiments.as_ref().map(|_| 0),
                    negativas: sentiments.as_ref().map(|_| 0),
                });
            bucket.total += 1;
            if let Some(sentiments) = &sentiments {
                if let Some(count) = bucket.positivas.as_mut() {
                    if sentiments[row] == SENTIMENT_POSITIVE {
                        *count += 1;
                    }
                }
                if let Some(count) = bucket.negativas.as_mut() {
                    if sentiments[row] == SENTIMENT_NEGATIVE {
                        *count += 1;
                    }
                }
            }
        }
    }
    TimelineFile {
        generado: Utc::now().to_rfc3339(),
        meses,
    }
}

impl Phase for VisualizationExport {
    fn number(&self) -> u8 {
        8
    }

    fn name(&self) -> &str {
        "export-viz"
    }

    fn description(&self) -> &str {
        "write the distribution and timeline JSON for the chart layer"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        Ok(ctx.config.viz_distributions_path().exists()
            && ctx.config.viz_timeline_path().exists())
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let dataset = ctx.load_dataset()?;
        let distributions = distributions(&dataset);
        let timeline = timeline(&dataset);
        report::write_json_atomic(&ctx.config.viz_distributions_path(), &distributions)?;
        report::write_json_atomic(&ctx.config.viz_timeline_path(), &timeline)?;

        println!("  wrote {} month buckets", timeline.meses.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{COL_CLEAN_TEXT, SENTIMENT_NEUTRAL};

    fn dataset_with_dates() -> Dataset {
        let mut ds = Dataset::new(vec![
            COL_CLEAN_TEXT.to_string(),
            COL_DATE.to_string(),
            COL_SENTIMENT.to_string(),
        ]);
        let rows = [
            ("playa hermosa", "2023-01-10", SENTIMENT_POSITIVE),
            ("muy caro", "2023-01-20", SENTIMENT_NEGATIVE),
            ("un lugar", "2023-02-02", SENTIMENT_NEUTRAL),
            ("sin fecha", "n/a", SENTIMENT_NEUTRAL),
        ];
        for (text, date, sentiment) in rows {
            ds.push_row(vec![text.into(), date.into(), sentiment.into()])
                .unwrap();
        }
        ds
    }

    #[test]
    fn timeline_buckets_by_month_and_skips_bad_dates() {
        let file = timeline(&dataset_with_dates());
        assert_eq!(file.meses.len(), 2);
        let january = &file.meses["2023-01"];
        assert_eq!(january.total, 2);
        assert_eq!(january.positivas, Some(1));
        assert_eq!(january.negativas, Some(1));
        let february = &file.meses["2023-02"];
        assert_eq!(february.total, 1);
        assert_eq!(february.positivas, Some(0));
    }

    #[test]
    fn missing_sentiment_column_yields_null_counts() {
        let mut ds = Dataset::new(vec![COL_DATE.to_string()]);
        ds.push_row(vec!["2023-03-05".into()]).unwrap();
        let file = timeline(&ds);
        assert_eq!(file.meses["2023-03"].positivas, None);
    }

    #[test]
    fn apply_writes_both_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = crate::phases::testutil::context(&dir);
        dataset_with_dates().save(&ctx.config.dataset_path()).unwrap();

        let phase = VisualizationExport;
        assert!(!phase.is_applied(&ctx).unwrap());
        phase.apply(&ctx).unwrap();
        assert!(phase.is_applied(&ctx).unwrap());

        let text = std::fs::read_to_string(ctx.config.viz_distributions_path()).unwrap();
        let file: DistributionsFile = serde_json::from_str(&text).unwrap();
        let sentiment = file.sentimiento.unwrap();
        assert_eq!(sentiment.conteo[SENTIMENT_NEUTRAL], 2);
        assert!(file.calificacion.is_none(), "no rating column in this store");
    }
}
