use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;
use std::collections::{HashMap, HashSet};

use super::topics::content_tokens;
use super::{clean, lexicon, require_column, Phase, PhaseContext};
use crate::dataset::{Dataset, COL_CLEAN_TEXT, COL_KEY_PHRASE, COL_REVIEW};

const MAX_PHRASE_CHARS: usize = 140;

/// Phase 6: extracts one representative sentence per review into
/// `FraseClave`. A sentence scores by how much corpus-frequent vocabulary
/// it carries, normalized so short dense sentences can beat long ones.
pub struct KeyPhraseExtraction;

pub fn sentence_splitter() -> Result<Regex> {
    Ok(Regex::new(r"[.!?¡¿]+")?)
}

/// Best-scoring sentence of the raw review, trimmed and capped. Scoring
/// runs over the same normalization as `TextoLimpio` so the frequency
/// table keys match. Ties keep the earliest sentence.
pub fn extract_phrase(
    raw_review: &str,
    frequency: &HashMap<&str, usize>,
    stopwords: &HashSet<&str>,
    splitter: &Regex,
    url_pattern: &Regex,
) -> String {
    let mut best: Option<&str> = None;
    let mut best_score = f64::NEG_INFINITY;
    for candidate in splitter.split(raw_review) {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        let normalized = clean::normalize(candidate, url_pattern);
        let tokens = content_tokens(&normalized, stopwords);
        let score = if tokens.is_empty() {
            0.0
        } else {
            let sum: usize = tokens
                .iter()
                .map(|t| frequency.get(*t).copied().unwrap_or(0))
                .sum();
            sum as f64 / (tokens.len() as f64).sqrt()
        };
        if score > best_score {
            best_score = score;
            best = Some(candidate);
        }
    }
    match best {
        Some(phrase) => phrase.chars().take(MAX_PHRASE_CHARS).collect(),
        None => String::new(),
    }
}

impl Phase for KeyPhraseExtraction {
    fn number(&self) -> u8 {
        6
    }

    fn name(&self) -> &str {
        "summaries"
    }

    fn description(&self) -> &str {
        "pick the most representative sentence of each review"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        Ok(Dataset::file_has_column(
            &ctx.config.dataset_path(),
            COL_KEY_PHRASE,
        )?)
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let mut dataset = ctx.load_dataset()?;
        require_column(&dataset, COL_CLEAN_TEXT, self.number(), 1)?;
        require_column(&dataset, COL_REVIEW, self.number(), 0)?;

        let stopwords: HashSet<&str> = lexicon::STOPWORDS.iter().copied().collect();
        let splitter = sentence_splitter()?;
        let url_pattern = clean::url_pattern()?;

        let clean_texts = dataset.column(COL_CLEAN_TEXT).unwrap_or_default();
        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for text in &clean_texts {
            for token in content_tokens(text, &stopwords) {
                *frequency.entry(token).or_insert(0) += 1;
            }
        }

        let phrases: Vec<String> = dataset
            .column(COL_REVIEW)
            .unwrap_or_default()
            .par_iter()
            .map(|raw| extract_phrase(raw, &frequency, &stopwords, &splitter, &url_pattern))
            .collect();

        dataset.set_column(COL_KEY_PHRASE, phrases)?;
        ctx.save_dataset(&dataset)?;

        println!("  extracted {} key phrases", dataset.row_count());
        Ok(())
    }
}
