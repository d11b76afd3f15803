use anyhow::Result;

use super::{Phase, PhaseContext};
use crate::dataset::validate_file;
use crate::report::{self, InsightReport};

/// Phase 7: rebuilds the insight report from the fully enriched dataset.
/// Facets whose column is still missing stay `null`; the phase never
/// fails over an absent column.
pub struct InsightGeneration;

impl Phase for InsightGeneration {
    fn number(&self) -> u8 {
        7
    }

    fn name(&self) -> &str {
        "insights"
    }

    fn description(&self) -> &str {
        "compute KPIs, strengths, weaknesses and per-place summaries"
    }

    fn is_applied(&self, ctx: &PhaseContext) -> Result<bool> {
        let path = ctx.config.report_path();
        if !path.exists() {
            return Ok(false);
        }
        let report = InsightReport::load(&path)?;
        Ok(report.informe_generado)
    }

    fn apply(&self, ctx: &PhaseContext) -> Result<()> {
        let dataset = ctx.load_dataset()?;
        let validation = validate_file(&ctx.config.dataset_path());
        let report = report::build(&dataset, validation, ctx.config.min_category_mentions);
        report.save(&ctx.config.report_path())?;

        println!(
            "  report written: {} fortalezas, {} debilidades, {} lugares",
            report.fortalezas.len(),
            report.debilidades.len(),
            report.resumenes.len()
        );
        Ok(())
    }
}
