use anyhow::Result;
use rayon::prelude::*;
use regex::Regex;

use super::{require_column, Phase, PhaseContext};
use crate::dataset::{Dataset, COL_CLEAN_TEXT, COL_REVIEW};

/// Phase 1: normalizes the raw review text into `TextoLimpio` and drops
/// rows with nothing usable in them. This is the only phase allowed to
/// change the row count; everything downstream works row-for-row.
pub struct CleanText;

/// Normalization applied to every review before any lexicon matching:
/// lowercase, URLs removed, vowel accents folded (ñ survives), anything
/// that is not alphanumeric becomes a space, runs of spaces collapse.
pub fn normalize(raw: &str, url_pattern: &Regex) -> String {
    let lowered = raw.to_lowercase();
    let without_urls = url_pattern.replace_all(&lowered, " ");
    let mut folded = String::with_capacity(without_urls.len());
    for c in without_urls.chars() {
        let c = match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            other => other,
        };
        if c.is_alphanumeric() || c.is_whitespace() {
            folded.push(c);
        } else {
            folded.push(' ');
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn url_pattern() -> Result<Regex> {
    Ok(Regex::new(r"(?i)https?://\S+|www\.\S+")?)
}

impl Phase for CleanText {
    fn number(&self) -> u8 {
        1
    }

    fn name(&self) -> &str {
        "clean-text"
    }

    fn description(&self) -> &str {
        "normalize review text into TextoLimpio and drop empty rows"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        Ok(Dataset::file_has_column(
            &ctx.config.dataset_path(),
            COL_CLEAN_TEXT,
        )?)
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let mut dataset = ctx.load_dataset()?;
        require_column(&dataset, COL_REVIEW, self.number(), 0)?;
        let before = dataset.row_count();

        let pattern = url_pattern()?;
        let cleaned: Vec<String> = dataset
            .column(COL_REVIEW)
            .unwrap_or_default()
            .par_iter()
            .map(|raw| normalize(raw, &pattern))
            .collect();

        let keep: Vec<bool> = cleaned.iter().map(|c| !c.is_empty()).collect();
        let mut index = 0;
        dataset.retain_rows(|_| {
            let kept = keep[index];
            index += 1;
            kept
        });
        let kept_values: Vec<String> = cleaned
            .into_iter()
            .zip(&keep)
            .filter(|(_, keep)| **keep)
            .map(|(value, _)| value)
            .collect();
        dataset.set_column(COL_CLEAN_TEXT, kept_values)?;
        ctx.save_dataset(&dataset)?;

        let dropped = before - dataset.row_count();
        println!(
            "  normalized {} reviews ({} unusable rows dropped)",
            dataset.row_count(),
            dropped
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_accents_and_strips_urls() {
        let pattern = url_pattern().unwrap();
        assert_eq!(
            normalize("¡La atención fue EXCELENTE! https://t.co/x", &pattern),
            "la atencion fue excelente"
        );
        assert_eq!(normalize("baño  limpio", &pattern), "baño limpio");
        assert_eq!(normalize("...", &pattern), "");
    }

    #[test]
    fn normalize_keeps_digits_separated() {
        let pattern = url_pattern().unwrap();
        assert_eq!(normalize("10/10 volvería", &pattern), "10 10 volveria");
    }

    #[test]
    fn apply_drops_empty_reviews_and_adds_column() {
        let dir = tempfile::TempDir::new().unwrap();
        let ctx = crate::phases::testutil::context(&dir);

        let mut ds = Dataset::new(vec![COL_REVIEW.to_string(), "Lugar".to_string()]);
        ds.push_row(vec!["Una PLAYA preciosa".into(), "Tolu".into()])
            .unwrap();
        ds.push_row(vec!["   ".into(), "Tolu".into()]).unwrap();
        ds.push_row(vec!["Muy caro".into(), "Coveñas".into()]).unwrap();
        ds.save(&ctx.config.dataset_path()).unwrap();

        let phase = CleanText;
        assert!(!phase.is_applied(&ctx).unwrap());
        phase.apply(&ctx).unwrap();
        assert!(phase.is_applied(&ctx).unwrap());

        let out = Dataset::load(&ctx.config.dataset_path()).unwrap();
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.get(0, COL_CLEAN_TEXT), Some("una playa preciosa"));
        assert_eq!(out.get(1, COL_CLEAN_TEXT), Some("muy caro"));
    }
}
