use anyhow::Result;
use rayon::prelude::*;
use std::collections::HashSet;

use super::{lexicon, require_column, Phase, PhaseContext};
use crate::dataset::{Dataset, CATEGORY_SEPARATOR, COL_CATEGORIES, COL_CLEAN_TEXT};

/// Phase 4: multi-label aspect tagging. A review joins every category
/// whose vocabulary it mentions; `General` is the fallback so the cell is
/// never empty. Labels keep the fixed order of the vocabulary table.
pub struct CategoryTagging;

pub fn tag(text: &str) -> String {
    let tokens: HashSet<&str> = text.split_whitespace().collect();
    let mut labels: Vec<&str> = Vec::new();
    for (label, keywords) in lexicon::CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| tokens.contains(k)) {
            labels.push(label);
        }
    }
    if labels.is_empty() {
        lexicon::DEFAULT_CATEGORY.to_string()
    } else {
        labels.join(&CATEGORY_SEPARATOR.to_string())
    }
}

impl Phase for CategoryTagging {
    fn number(&self) -> u8 {
        4
    }

    fn name(&self) -> &str {
        "categories"
    }

    fn description(&self) -> &str {
        "tag reviews with the tourism aspects they mention"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        Ok(Dataset::file_has_column(
            &ctx.config.dataset_path(),
            COL_CATEGORIES,
        )?)
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let mut dataset = ctx.load_dataset()?;
        require_column(&dataset, COL_CLEAN_TEXT, self.number(), 1)?;

        let cells: Vec<String> = dataset
            .column(COL_CLEAN_TEXT)
            .unwrap_or_default()
            .par_iter()
            .map(|text| tag(text))
            .collect();
        dataset.set_column(COL_CATEGORIES, cells)?;
        ctx.save_dataset(&dataset)?;

        println!("  tagged {} reviews", dataset.row_count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_label_keeps_fixed_order() {
        assert_eq!(
            tag("la comida deliciosa pero el hotel muy sucio"),
            "Alojamiento;Gastronomia;Limpieza"
        );
        assert_eq!(tag("el tour por la playa"), "Actividades");
        assert_eq!(tag("un dia cualquiera"), "General");
    }

    #[test]
    fn apply_adds_the_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = crate::phases::testutil::context(&dir);

        let mut ds = Dataset::new(vec![COL_CLEAN_TEXT.to_string()]);
        ds.push_row(vec!["precio muy caro para esa habitacion".into()])
            .unwrap();
        ds.save(&ctx.config.dataset_path()).unwrap();

        let phase = CategoryTagging;
        phase.apply(&ctx).unwrap();

        let out = Dataset::load(&ctx.config.dataset_path()).unwrap();
        assert_eq!(
            out.column(COL_CATEGORIES).unwrap(),
            vec!["Alojamiento;Precio"]
        );
        assert!(phase.is_applied(&ctx).unwrap());
    }
}
