use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::{lexicon, require_column, Phase, PhaseContext};
use crate::dataset::{Dataset, COL_CLEAN_TEXT, COL_TOPIC};
use crate::report::write_json_atomic;

/// Phase 5: groups reviews around the corpus's dominant terms.
///
/// Seeds are the most document-frequent content words; a review lands on
/// the first seed it mentions, or failing that on the seed whose
/// co-occurring vocabulary it overlaps most. Everything is counted, so
/// re-runs produce identical assignments.
pub struct TopicModeling;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicDescriptor {
    pub id: usize,
    pub etiqueta: String,
    pub terminos: Vec<String>,
    pub reviews: usize,
}

/// Contents of `topicos.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsFile {
    pub generado: String,
    pub total_topicos: usize,
    pub topicos: Vec<TopicDescriptor>,
}

pub(crate) fn content_tokens<'a>(text: &'a str, stopwords: &HashSet<&str>) -> HashSet<&'a str> {
    text.split_whitespace()
        .filter(|w| w.len() >= 3 && !stopwords.contains(w))
        .collect()
}

/// Returns one topic index per text plus the topic descriptors.
pub fn model_topics(texts: &[&str], topic_count: usize) -> (Vec<usize>, Vec<TopicDescriptor>) {
    let stopwords: HashSet<&str> = lexicon::STOPWORDS.iter().copied().collect();
    let row_tokens: Vec<HashSet<&str>> = texts
        .iter()
        .map(|t| content_tokens(t, &stopwords))
        .collect();

    let mut document_frequency: HashMap<&str, usize> = HashMap::new();
    for tokens in &row_tokens {
        for token in tokens {
            *document_frequency.entry(token).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = document_frequency
        .iter()
        .map(|(t, c)| (*t, *c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let seeds: Vec<&str> = ranked.iter().take(topic_count).map(|(t, _)| *t).collect();

    // Terms that travel with each seed, for the descriptor and for the
    // overlap fallback.
    let mut cooccurring: Vec<HashMap<&str, usize>> = vec![HashMap::new(); seeds.len()];
    for tokens in &row_tokens {
        for (seed_index, seed) in seeds.iter().enumerate() {
            if tokens.contains(seed) {
                for token in tokens {
                    if token != seed {
                        *cooccurring[seed_index].entry(token).or_insert(0) += 1;
                    }
                }
            }
        }
    }
    let cooccurring_keys: Vec<HashSet<&str>> = cooccurring
        .iter()
        .map(|m| m.keys().copied().collect())
        .collect();

    let assignments: Vec<usize> = row_tokens
        .iter()
        .map(|tokens| {
            if let Some(direct) = seeds.iter().position(|s| tokens.contains(s)) {
                return direct;
            }
            let mut best = 0usize;
            let mut best_score = 0usize;
            for (seed_index, keys) in cooccurring_keys.iter().enumerate() {
                let score = tokens.iter().filter(|t| keys.contains(*t)).count();
                if score > best_score {
                    best_score = score;
                    best = seed_index;
                }
            }
            best
        })
        .collect();

    let mut per_topic = vec![0usize; seeds.len()];
    for assignment in &assignments {
        if *assignment < per_topic.len() {
            per_topic[*assignment] += 1;
        }
    }

    let descriptors: Vec<TopicDescriptor> = seeds
        .iter()
        .enumerate()
        .map(|(id, seed)| {
            let mut terms: Vec<(&str, usize)> = cooccurring[id]
                .iter()
                .map(|(t, c)| (*t, *c))
                .collect();
            terms.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
            TopicDescriptor {
                id,
                etiqueta: seed.to_string(),
                terminos: terms.into_iter().take(5).map(|(t, _)| t.to_string()).collect(),
                reviews: per_topic[id],
            }
        })
        .collect();

    (assignments, descriptors)
}

impl Phase for TopicModeling {
    fn number(&self) -> u8 {
        5
    }

    fn name(&self) -> &str {
        "topics"
    }

    fn description(&self) -> &str {
        "assign each review to a dominant-term topic and write topicos.json"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        let column = Dataset::file_has_column(&ctx.config.dataset_path(), COL_TOPIC)?;
        Ok(column && ctx.config.topics_path().exists())
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let mut dataset = ctx.load_dataset()?;
        require_column(&dataset, COL_CLEAN_TEXT, self.number(), 1)?;

        let texts = dataset.column(COL_CLEAN_TEXT).unwrap_or_default();
        let (assignments, descriptors) = model_topics(&texts, ctx.config.topic_count);

        dataset.set_column(
            COL_TOPIC,
            assignments.iter().map(|a| a.to_string()).collect(),
        )?;
        ctx.save_dataset(&dataset)?;

        let file = TopicsFile {
            generado: Utc::now().to_rfc3339(),
            total_topicos: descriptors.len(),
            topicos: descriptors,
        };
        write_json_atomic(&ctx.config.topics_path(), &file)?;

        println!(
            "  assigned {} reviews to {} topics",
            dataset.row_count(),
            file.total_topicos
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_rank_by_frequency_then_alphabet() {
        let texts = [
            "playa hermosa playa",
            "playa limpia",
            "comida rica",
            "comida deliciosa comida",
        ];
        let (assignments, descriptors) = model_topics(&texts, 2);
        assert_eq!(assignments, vec![1, 1, 0, 0]);
        assert_eq!(descriptors[0].etiqueta, "comida");
        assert_eq!(descriptors[1].etiqueta, "playa");
        assert_eq!(descriptors[0].reviews, 2);
        assert_eq!(descriptors[0].terminos, vec!["deliciosa", "rica"]);
    }

    #[test]
    fn unmatched_rows_fall_back_to_overlap() {
        let texts = [
            "playa hermosa playa",
            "playa limpia",
            "comida rica",
            "comida deliciosa",
            "rica cena",
        ];
        let (assignments, _) = model_topics(&texts, 2);
        // "rica cena" mentions no seed but shares vocabulary with the
        // comida topic.
        assert_eq!(assignments[4], 0);
    }

    #[test]
    fn apply_writes_column_and_topics_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = crate::phases::testutil::context(&dir);

        let mut ds = Dataset::new(vec![COL_CLEAN_TEXT.to_string()]);
        for text in ["playa hermosa", "playa limpia", "comida rica"] {
            ds.push_row(vec![text.to_string()]).unwrap();
        }
        ds.save(&ctx.config.dataset_path()).unwrap();

        let phase = TopicModeling;
        assert!(!phase.is_applied(&ctx).unwrap());
        phase.apply(&ctx).unwrap();
        assert!(phase.is_applied(&ctx).unwrap());

        let out = Dataset::load(&ctx.config.dataset_path()).unwrap();
        for value in out.column(COL_TOPIC).unwrap() {
            value.parse::<usize>().unwrap();
        }

        let text = std::fs::read_to_string(ctx.config.topics_path()).unwrap();
        let file: TopicsFile = serde_json::from_str(&text).unwrap();
        assert_eq!(file.total_topicos, file.topicos.len());
        assert!(file.total_topicos >= 1);
    }
}
