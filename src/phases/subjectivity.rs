use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;

use super::{lexicon, require_column, Phase, PhaseContext};
use crate::dataset::{Dataset, COL_CLEAN_TEXT, COL_SUBJECTIVITY, OBJECTIVE, SUBJECTIVE};

/// Phase 3: splits reviews into opinion (`Subjetiva`) and description
/// (`Objetiva`) by counting evaluative markers. Polar words count as
/// markers too; a factual sentence mentions neither.
pub struct SubjectivityAnalysis;

fn marker_set() -> HashSet<&'static str> {
    lexicon::SUBJECTIVE_MARKERS
        .iter()
        .chain(lexicon::POSITIVE_WORDS)
        .chain(lexicon::NEGATIVE_WORDS)
        .copied()
        .collect()
}

/// Two markers anywhere, or one marker in a short review, tip the label
/// to subjective.
pub fn classify(text: &str, markers: &HashSet<&'static str>) -> &'static str {
    let mut hits = 0usize;
    let mut words = 0usize;
    for word in text.split_whitespace() {
        words += 1;
        if markers.contains(word) {
            hits += 1;
        }
    }
    if hits >= 2 || (hits == 1 && words <= 8) {
        SUBJECTIVE
    } else {
        OBJECTIVE
    }
}

impl Phase for SubjectivityAnalysis {
    fn number(&self) -> u8 {
        3
    }

    fn name(&self) -> &str {
        "subjectivity"
    }

    fn description(&self) -> &str {
        "mark each review Subjetiva or Objetiva"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        Ok(Dataset::file_has_column(
            &ctx.config.dataset_path(),
            COL_SUBJECTIVITY,
        )?)
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let mut dataset = ctx.load_dataset()?;
        require_column(&dataset, COL_CLEAN_TEXT, self.number(), 1)?;

        let markers = marker_set();
        let labels: Vec<String> = dataset
            .column(COL_CLEAN_TEXT)
            .unwrap_or_default()
            .par_iter()
            .map(|text| classify(text, &markers).to_string())
            .collect();
        dataset.set_column(COL_SUBJECTIVITY, labels)?;
        ctx.save_dataset(&dataset)?;

        println!("  classified {} reviews", dataset.row_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opinions_and_descriptions_split() {
        let markers = marker_set();
        assert_eq!(classify("creo que es hermoso", &markers), SUBJECTIVE);
        assert_eq!(classify("excelente", &markers), SUBJECTIVE);
        assert_eq!(
            classify("el hotel tiene piscina y gimnasio", &markers),
            OBJECTIVE
        );
        assert_eq!(classify("", &markers), OBJECTIVE);
    }

    #[test]
    fn single_marker_in_long_text_stays_objective() {
        let markers = marker_set();
        let long = "el hotel tiene piscina gimnasio restaurante bar terraza \
                    estacionamiento y una bonita vista al mar desde arriba";
        assert_eq!(classify(long, &markers), OBJECTIVE);
    }

    #[test]
    fn apply_adds_the_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = crate::phases::testutil::context(&dir);

        let mut ds = Dataset::new(vec![COL_CLEAN_TEXT.to_string()]);
        ds.push_row(vec!["me encanto este lugar".into()]).unwrap();
        ds.push_row(vec!["el museo abre a las nueve".into()]).unwrap();
        ds.save(&ctx.config.dataset_path()).unwrap();

        let phase = SubjectivityAnalysis;
        phase.apply(&ctx).unwrap();

        let out = Dataset::load(&ctx.config.dataset_path()).unwrap();
        assert_eq!(out.column(COL_SUBJECTIVITY).unwrap(), vec![SUBJECTIVE, OBJECTIVE]);
        assert!(phase.is_applied(&ctx).unwrap());
    }
}
