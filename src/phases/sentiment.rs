use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;

use super::{lexicon, require_column, Phase, PhaseContext};
use crate::dataset::{
    validate_file, Dataset, COL_CLEAN_TEXT, COL_SENTIMENT, SENTIMENT_NEGATIVE, SENTIMENT_NEUTRAL,
    SENTIMENT_POSITIVE,
};
use crate::report::InsightReport;

/// Phase 2: lexicon sentiment over `TextoLimpio`, plus the first write of
/// the insight report (skeleton only, keys in place, nothing computed).
pub struct SentimentAnalysis;

/// Signed hit count. A negation word opens a three-token window; the first
/// polar word inside it contributes with flipped sign.
pub fn score(text: &str, lists: &Lexicon) -> i32 {
    let mut total = 0;
    let mut negation_window = 0u8;
    for word in text.split_whitespace() {
        if lists.negations.contains(word) {
            negation_window = 3;
            continue;
        }
        let delta = if lists.positive.contains(word) {
            1
        } else if lists.negative.contains(word) {
            -1
        } else {
            0
        };
        if delta != 0 && negation_window > 0 {
            total -= delta;
            negation_window = 0;
        } else {
            total += delta;
            negation_window = negation_window.saturating_sub(1);
        }
    }
    total
}

pub fn label(score: i32) -> &'static str {
    if score > 0 {
        SENTIMENT_POSITIVE
    } else if score < 0 {
        SENTIMENT_NEGATIVE
    } else {
        SENTIMENT_NEUTRAL
    }
}

pub struct Lexicon {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negations: HashSet<&'static str>,
}

impl Lexicon {
    pub fn spanish() -> Self {
        Self {
            positive: lexicon::POSITIVE_WORDS.iter().copied().collect(),
            negative: lexicon::NEGATIVE_WORDS.iter().copied().collect(),
            negations: lexicon::NEGATION_WORDS.iter().copied().collect(),
        }
    }
}

impl Phase for SentimentAnalysis {
    fn number(&self) -> u8 {
        2
    }

    fn name(&self) -> &str {
        "sentiment"
    }

    fn description(&self) -> &str {
        "label each review Positivo, Neutro or Negativo and seed the report"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        let column = Dataset::file_has_column(&ctx.config.dataset_path(), COL_SENTIMENT)?;
        Ok(column && ctx.config.report_path().exists())
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let mut dataset = ctx.load_dataset()?;
        require_column(&dataset, COL_CLEAN_TEXT, self.number(), 1)?;

        let lists = Lexicon::spanish();
        let labels: Vec<String> = dataset
            .column(COL_CLEAN_TEXT)
            .unwrap_or_default()
            .par_iter()
            .map(|text| label(score(text, &lists)).to_string())
            .collect();
        dataset.set_column(COL_SENTIMENT, labels)?;
        ctx.save_dataset(&dataset)?;

        let validation = validate_file(&ctx.config.dataset_path());
        InsightReport::skeleton(validation).save(&ctx.config.report_path())?;

        println!("  labeled {} reviews, report skeleton written", dataset.row_count());
        Ok(())
    }
}
