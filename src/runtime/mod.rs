use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::dataset::{validate_file, Dataset, DatasetValidation};
use crate::error::{PipelineError, Result};
use crate::phases::{all_phases, phase_file_map, Phase, PhaseContext};
use crate::report::InsightReport;
use crate::rollback::{PhaseFileMap, RollbackManager};

/// Orchestrates the phase sequence: idempotence checks, backup sessions,
/// the row-count guard, and fail-fast error reporting. Every phase body
/// runs strictly inside a session, so any failure leaves the data files
/// exactly as the previous committed phase wrote them.
pub struct PipelineDriver {
    context: PhaseContext,
    phases: Vec<Box<dyn Phase>>,
    rollback: RollbackManager,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Skipped,
    Committed,
}

#[derive(Debug, Serialize)]
pub struct PhaseRun {
    pub phase: u8,
    pub name: String,
    pub state: PhaseState,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub executed: Vec<PhaseRun>,
}

impl RunSummary {
    pub fn committed(&self) -> usize {
        self.executed
            .iter()
            .filter(|r| r.state == PhaseState::Committed)
            .count()
    }
}

#[derive(Debug, Serialize)]
pub struct PhaseStatus {
    pub number: u8,
    pub name: String,
    pub description: String,
    pub applied: bool,
}

#[derive(Debug, Serialize)]
pub struct PipelineStatus {
    pub pipeline: String,
    pub dataset: DatasetValidation,
    pub report_generated: bool,
    pub phases: Vec<PhaseStatus>,
    pub interrupted_sessions: Vec<String>,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let map = phase_file_map(&config)?;
        Self::with_phases(config, all_phases(), map)
    }

    /// Constructor used by tests to run a reduced phase list; `new` goes
    /// through here with the full registry.
    pub fn with_phases(
        config: PipelineConfig,
        phases: Vec<Box<dyn Phase>>,
        map: PhaseFileMap,
    ) -> Result<Self> {
        for (index, phase) in phases.iter().enumerate() {
            if phase.number() as usize != index + 1 {
                return Err(PipelineError::Internal(format!(
                    "phase registry out of order: position {} holds phase {}",
                    index + 1,
                    phase.number()
                )));
            }
        }
        let total = phases.len() as u8;
        let rollback = RollbackManager::new(map, total, &config.backup_root());
        Ok(Self {
            context: PhaseContext::new(config),
            phases,
            rollback,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.context.config
    }

    /// Rolls back any session a crashed run left journaled. Callers run
    /// this before anything else touches the data files.
    pub fn recover_interrupted(&mut self) -> Result<Vec<String>> {
        let recovered = self.rollback.recover_stale_sessions()?;
        for id in &recovered {
            println!("• recovered interrupted session {}", id);
        }
        Ok(recovered)
    }

    /// Runs every phase in order, skipping the ones already applied
    /// unless `force` is set. Stops at the first failure.
    pub fn run_all(&mut self, force: bool) -> Result<RunSummary> {
        self.run_from(1, force)
    }

    /// Same as `run_all` but starts at `first_phase`. Useful when resuming
    /// a long corpus run; phases before the start point are not probed.
    pub fn run_from(&mut self, first_phase: u8, force: bool) -> Result<RunSummary> {
        let total = self.phases.len();
        if first_phase == 0 || first_phase as usize > total {
            return Err(PipelineError::UnknownPhase {
                requested: first_phase,
                total: total as u8,
            });
        }
        println!("Running pipeline: {}", self.context.config.name);
        let first_index = (first_phase - 1) as usize;
        let bar = ProgressBar::new((total - first_index) as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} phases ({percent}%)",
                )
                .unwrap(),
        );

        let mut executed = Vec::new();
        for index in first_index..total {
            let state = self.execute(index, force)?;
            executed.push(PhaseRun {
                phase: self.phases[index].number(),
                name: self.phases[index].name().to_string(),
                state,
            });
            bar.inc(1);
        }
        bar.finish_with_message("all phases processed");

        let summary = RunSummary { executed };
        println!(
            "\n✓ Pipeline completed: {} phases run, {} already applied",
            summary.committed(),
            summary.executed.len() - summary.committed()
        );
        Ok(summary)
    }

    /// Runs exactly one phase, honoring the same idempotence and backup
    /// rules as a full run.
    pub fn run_single(&mut self, phase_number: u8, force: bool) -> Result<RunSummary> {
        let total = self.phases.len() as u8;
        if phase_number == 0 || phase_number > total {
            return Err(PipelineError::UnknownPhase {
                requested: phase_number,
                total,
            });
        }
        let index = (phase_number - 1) as usize;
        let state = self.execute(index, force)?;
        Ok(RunSummary {
            executed: vec![PhaseRun {
                phase: phase_number,
                name: self.phases[index].name().to_string(),
                state,
            }],
        })
    }

    fn execute(&mut self, index: usize, force: bool) -> Result<PhaseState> {
        let total = self.phases.len();
        let phase = &self.phases[index];
        let number = phase.number();
        println!("\n[Phase {}/{}] {}", number, total, phase.name());

        if !force {
            match phase.is_applied(&self.context) {
                Ok(true) => {
                    println!("  ✓ already applied, skipping");
                    return Ok(PhaseState::Skipped);
                }
                Ok(false) => {}
                Err(e) => {
                    // An unreadable probe is treated as "not applied"; the
                    // phase re-runs and rewrites its output.
                    println!("  ! could not check phase output ({}), re-running", e);
                }
            }
        }

        // Phase 1 owns the initial load and may drop rows. Everything
        // after it must keep the count stable.
        let guarded_rows = if number >= 2 {
            let path = self.context.config.dataset_path();
            if path.exists() {
                Some(Dataset::count_data_rows(&path)?)
            } else {
                None
            }
        } else {
            None
        };

        let session = self.rollback.begin_phase(number)?;
        match self.phases[index].apply(&self.context) {
            Ok(()) => {}
            Err(source) => {
                self.rollback.rollback(&session)?;
                println!("  ✗ failed, changes rolled back");
                return Err(PipelineError::Phase {
                    phase: number,
                    name: self.phases[index].name().to_string(),
                    source,
                });
            }
        }

        if let Some(before) = guarded_rows {
            let after = Dataset::count_data_rows(&self.context.config.dataset_path())?;
            if after != before {
                self.rollback.rollback(&session)?;
                println!("  ✗ row count changed, rolled back");
                return Err(PipelineError::RowCountDrift {
                    phase: number,
                    before,
                    after,
                });
            }
        }

        self.rollback.commit(&session)?;
        println!("  ✓ committed ({})", session);
        Ok(PhaseState::Committed)
    }

    /// Applied flags for every phase plus the interrupted-session list.
    /// Probe errors read as "not applied"; status never fails over them.
    pub fn status(&self) -> Result<PipelineStatus> {
        let config = &self.context.config;
        let phases = self
            .phases
            .iter()
            .map(|phase| PhaseStatus {
                number: phase.number(),
                name: phase.name().to_string(),
                description: phase.description().to_string(),
                applied: phase.is_applied(&self.context).unwrap_or(false),
            })
            .collect();
        let interrupted = self
            .rollback
            .journaled_sessions()?
            .into_iter()
            .map(|s| s.id)
            .collect();
        Ok(PipelineStatus {
            pipeline: config.name.clone(),
            dataset: validate_file(&config.dataset_path()),
            report_generated: InsightReport::load(&config.report_path())
                .map(|r| r.informe_generado)
                .unwrap_or(false),
            phases,
            interrupted_sessions: interrupted,
        })
    }

    pub fn validate(&self) -> DatasetValidation {
        validate_file(&self.context.config.dataset_path())
    }

    pub fn report(&self) -> Result<InsightReport> {
        let path = self.context.config.report_path();
        if !path.exists() {
            return Err(PipelineError::ReportMissing { path });
        }
        InsightReport::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Writes a marker file when applied; optionally appends a row to the
    /// dataset or fails outright.
    struct FakePhase {
        number: u8,
        marker: PathBuf,
        append_row: bool,
        fail: bool,
    }

    impl Phase for FakePhase {
        fn number(&self) -> u8 {
            self.number
        }

        fn name(&self) -> &str {
            "fake"
        }

        fn description(&self) -> &str {
            "test stand-in"
        }

        fn is_applied(&self, _ctx: &PhaseContext) -> anyhow::Result<bool> {
            Ok(self.marker.exists())
        }

        fn apply(&self, ctx: &PhaseContext) -> anyhow::Result<()> {
            if self.fail {
                return Err(anyhow!("synthetic failure"));
            }
            if self.append_row {
                let mut content = fs::read_to_string(ctx.config.dataset_path())?;
                content.push_str("extra,row\n");
                fs::write(ctx.config.dataset_path(), content)?;
            }
            fs::write(&self.marker, self.number.to_string())?;
            Ok(())
        }
    }

    fn seed_dataset(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("dataset.csv");
        fs::write(&path, "Review,Lugar\nhola,Tolu\nadios,Tolu\n").unwrap();
        path
    }

    fn driver_with(
        dir: &TempDir,
        phases: Vec<Box<dyn Phase>>,
    ) -> PipelineDriver {
        let config = PipelineConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let dataset = config.dataset_path();
        let mut entries = BTreeMap::new();
        for phase in 1..=phases.len() as u8 {
            entries.insert(phase, vec![dataset.clone()]);
        }
        let map = PhaseFileMap::new(phases.len() as u8, entries).unwrap();
        PipelineDriver::with_phases(config, phases, map).unwrap()
    }

    fn fake(number: u8, dir: &TempDir) -> FakePhase {
        FakePhase {
            number,
            marker: dir.path().join(format!("marker{}", number)),
            append_row: false,
            fail: false,
        }
    }

    #[test]
    fn run_all_commits_then_skips() {
        let dir = TempDir::new().unwrap();
        seed_dataset(&dir);
        let mut driver = driver_with(
            &dir,
            vec![Box::new(fake(1, &dir)), Box::new(fake(2, &dir))],
        );

        let first = driver.run_all(false).unwrap();
        assert_eq!(first.committed(), 2);

        let second = driver.run_all(false).unwrap();
        assert_eq!(second.committed(), 0);
        assert!(second
            .executed
            .iter()
            .all(|r| r.state == PhaseState::Skipped));
    }

    #[test]
    fn failure_rolls_back_and_stops_the_run() {
        let dir = TempDir::new().unwrap();
        let dataset = seed_dataset(&dir);
        let original = fs::read_to_string(&dataset).unwrap();

        let mut failing = fake(2, &dir);
        failing.fail = true;
        let mut driver = driver_with(
            &dir,
            vec![Box::new(fake(1, &dir)), Box::new(failing)],
        );

        let err = driver.run_all(false).unwrap_err();
        assert!(matches!(err, PipelineError::Phase { phase: 2, .. }));
        // Phase 1 stays committed, phase 2 left no trace.
        assert!(dir.path().join("marker1").exists());
        assert!(!dir.path().join("marker2").exists());
        assert_eq!(fs::read_to_string(&dataset).unwrap(), original);
        // The failed session is fully resolved.
        assert!(driver.rollback.active_session().is_none());
    }

    #[test]
    fn row_count_drift_is_rejected_and_rolled_back() {
        let dir = TempDir::new().unwrap();
        let dataset = seed_dataset(&dir);
        let original = fs::read_to_string(&dataset).unwrap();

        let mut drifting = fake(2, &dir);
        drifting.append_row = true;
        let mut driver = driver_with(
            &dir,
            vec![Box::new(fake(1, &dir)), Box::new(drifting)],
        );

        let err = driver.run_all(false).unwrap_err();
        match err {
            PipelineError::RowCountDrift { phase, before, after } => {
                assert_eq!(phase, 2);
                assert_eq!(before, 2);
                assert_eq!(after, 3);
            }
            other => panic!("expected RowCountDrift, got {:?}", other),
        }
        assert_eq!(fs::read_to_string(&dataset).unwrap(), original);
    }

    #[test]
    fn first_phase_may_change_the_row_count() {
        let dir = TempDir::new().unwrap();
        seed_dataset(&dir);
        let mut dropping = fake(1, &dir);
        dropping.append_row = true;
        let mut driver = driver_with(&dir, vec![Box::new(dropping)]);
        driver.run_all(false).unwrap();
    }

    #[test]
    fn run_single_respects_force() {
        let dir = TempDir::new().unwrap();
        seed_dataset(&dir);
        let mut driver = driver_with(&dir, vec![Box::new(fake(1, &dir))]);

        assert_eq!(driver.run_single(1, false).unwrap().committed(), 1);
        assert_eq!(driver.run_single(1, false).unwrap().committed(), 0);
        assert_eq!(driver.run_single(1, true).unwrap().committed(), 1);
        assert!(matches!(
            driver.run_single(9, false),
            Err(PipelineError::UnknownPhase { requested: 9, .. })
        ));
    }

    #[test]
    fn run_from_skips_earlier_phases_entirely() {
        let dir = TempDir::new().unwrap();
        seed_dataset(&dir);
        let mut driver = driver_with(
            &dir,
            vec![Box::new(fake(1, &dir)), Box::new(fake(2, &dir))],
        );

        let summary = driver.run_from(2, false).unwrap();
        assert_eq!(summary.executed.len(), 1);
        assert_eq!(summary.executed[0].phase, 2);
        assert!(!dir.path().join("marker1").exists(), "phase 1 must not run");
        assert!(dir.path().join("marker2").exists());
        assert!(matches!(
            driver.run_from(0, false),
            Err(PipelineError::UnknownPhase { requested: 0, .. })
        ));
    }

    #[test]
    fn status_reports_applied_flags() {
        let dir = TempDir::new().unwrap();
        seed_dataset(&dir);
        let mut driver = driver_with(
            &dir,
            vec![Box::new(fake(1, &dir)), Box::new(fake(2, &dir))],
        );
        driver.run_single(1, false).unwrap();

        let status = driver.status().unwrap();
        assert_eq!(status.phases.len(), 2);
        assert!(status.phases[0].applied);
        assert!(!status.phases[1].applied);
        assert!(status.dataset.valido);
        assert!(!status.report_generated);
        assert!(status.interrupted_sessions.is_empty());
    }
}
