use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{PipelineError, Result};

/// Which files each phase is allowed to touch. The map must carry an entry
/// for every phase ordinal, even an empty one, so a missing registration is
/// caught at startup instead of surfacing as an unprotected write later.
#[derive(Debug, Clone)]
pub struct PhaseFileMap {
    entries: BTreeMap<u8, Vec<PathBuf>>,
}

impl PhaseFileMap {
    pub fn new(total_phases: u8, entries: BTreeMap<u8, Vec<PathBuf>>) -> Result<Self> {
        for phase in 1..=total_phases {
            if !entries.contains_key(&phase) {
                return Err(PipelineError::Config(format!(
                    "phase file map is missing an entry for phase {}",
                    phase
                )));
            }
        }
        if let Some(bad) = entries.keys().find(|p| **p == 0 || **p > total_phases) {
            return Err(PipelineError::Config(format!(
                "phase file map entry {} is outside 1..={}",
                bad, total_phases
            )));
        }
        Ok(Self { entries })
    }

    pub fn files_for(&self, phase: u8) -> &[PathBuf] {
        self.entries.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// One backed-up file inside a session: where it came from, the copy's name
/// inside the session directory, and the copy's digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBackup {
    pub original: PathBuf,
    pub backup: String,
    pub sha256: String,
}

/// On-disk journal of one backup session. Persisted as `session.json`
/// inside the session directory the moment the session opens, so a crashed
/// run can be rolled back by the next process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub phase: u8,
    pub started_at: String,
    pub backups: Vec<FileBackup>,
    pub absent_at_start: Vec<PathBuf>,
    pub new_files: Vec<PathBuf>,
}

const JOURNAL_FILE: &str = "session.json";

/// Full-copy backup manager with a single active session slot.
///
/// `begin_phase` snapshots the phase's mapped files, the phase mutates them,
/// then exactly one of `commit` or `rollback` resolves the session. Restores
/// verify each backup copy's SHA-256 before touching the live file.
pub struct RollbackManager {
    backup_root: PathBuf,
    file_map: PhaseFileMap,
    total_phases: u8,
    active: Option<Session>,
}

impl RollbackManager {
    pub fn new(file_map: PhaseFileMap, total_phases: u8, backup_root: &Path) -> Self {
        Self {
            backup_root: backup_root.to_path_buf(),
            file_map,
            total_phases,
            active: None,
        }
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn active_phase(&self) -> Option<u8> {
        self.active.as_ref().map(|s| s.phase)
    }

    /// Opens a session for `phase`: copies every mapped file that exists
    /// into a fresh session directory, records the ones that do not exist
    /// yet, and journals the whole session to disk before returning.
    pub fn begin_phase(&mut self, phase: u8) -> Result<String> {
        if phase == 0 || phase > self.total_phases {
            return Err(PipelineError::Internal(format!(
                "phase {} is outside 1..={}",
                phase, self.total_phases
            )));
        }
        if let Some(active) = &self.active {
            return Err(PipelineError::SessionConflict {
                active: active.id.clone(),
                requested: phase,
            });
        }
        // A journaled session left by a crashed run blocks new work until
        // it is recovered; starting on top of it would orphan its backups.
        if let Some(stale) = self.journaled_sessions()?.into_iter().next() {
            return Err(PipelineError::SessionConflict {
                active: stale.id,
                requested: phase,
            });
        }

        let id = new_session_id(phase);
        let dir = self.session_dir(&id);
        fs::create_dir_all(&dir)?;

        let mut backups = Vec::new();
        let mut absent_at_start = Vec::new();
        for (index, original) in self.file_map.files_for(phase).iter().enumerate() {
            if original.exists() {
                let backup = format!("f{}.bak", index);
                let target = dir.join(&backup);
                fs::copy(original, &target).map_err(|e| PipelineError::Backup {
                    path: original.clone(),
                    reason: e.to_string(),
                })?;
                let sha256 = sha256_file(&target)?;
                backups.push(FileBackup {
                    original: original.clone(),
                    backup,
                    sha256,
                });
            } else {
                absent_at_start.push(original.clone());
            }
        }

        let session = Session {
            id: id.clone(),
            phase,
            started_at: Utc::now().to_rfc3339(),
            backups,
            absent_at_start,
            new_files: Vec::new(),
        };
        self.write_journal(&session)?;
        self.active = Some(session);
        Ok(id)
    }

    /// Registers a file the running phase created outside its map entry, so
    /// a rollback removes it. The registration is journaled immediately.
    pub fn track_new_file(&mut self, session_id: &str, path: &Path) -> Result<()> {
        let active_id = self.active.as_ref().map(|s| s.id.clone());
        match &mut self.active {
            Some(session) if session.id == session_id => {
                let path = path.to_path_buf();
                if !session.new_files.contains(&path) {
                    session.new_files.push(path);
                }
                let snapshot = session.clone();
                self.write_journal(&snapshot)
            }
            _ => Err(PipelineError::SessionMismatch {
                given: session_id.to_string(),
                active: active_id,
            }),
        }
    }

    /// Keeps the phase's writes and discards the session's backups.
    pub fn commit(&mut self, session_id: &str) -> Result<()> {
        match &self.active {
            Some(session) if session.id == session_id => {
                let dir = self.session_dir(session_id);
                if dir.exists() {
                    fs::remove_dir_all(&dir)?;
                }
                self.active = None;
                Ok(())
            }
            other => Err(PipelineError::SessionMismatch {
                given: session_id.to_string(),
                active: other.as_ref().map(|s| s.id.clone()),
            }),
        }
    }

    /// Restores every backed-up file and deletes files the phase created.
    ///
    /// Rolling back a session that is already resolved (or was never opened)
    /// is a no-op; asking while a different session is active is an error.
    pub fn rollback(&mut self, session_id: &str) -> Result<()> {
        match &self.active {
            Some(session) if session.id == session_id => {
                let session = session.clone();
                self.restore(&session)?;
                self.active = None;
                Ok(())
            }
            Some(other) => Err(PipelineError::SessionMismatch {
                given: session_id.to_string(),
                active: Some(other.id.clone()),
            }),
            None => {
                // The id may belong to a journaled session from a crashed
                // run; otherwise there is nothing left to undo.
                match self.read_journal(session_id)? {
                    Some(session) => self.restore(&session),
                    None => Ok(()),
                }
            }
        }
    }

    /// Rolls back every journaled session left on disk by interrupted runs
    /// and sweeps session directories that never got a journal. Returns the
    /// ids that were restored.
    pub fn recover_stale_sessions(&mut self) -> Result<Vec<String>> {
        let mut recovered = Vec::new();
        for session in self.journaled_sessions()? {
            let id = session.id.clone();
            self.restore(&session)?;
            recovered.push(id);
        }
        self.sweep_journalless_dirs()?;
        Ok(recovered)
    }

    /// All sessions with a journal on disk. The single-slot rule means at
    /// most one should ever exist; the scan still returns them all.
    pub fn journaled_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();
        if !self.backup_root.exists() {
            return Ok(sessions);
        }
        let mut dirs: Vec<PathBuf> = fs::read_dir(&self.backup_root)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        for dir in dirs {
            let journal = dir.join(JOURNAL_FILE);
            if !journal.exists() {
                continue;
            }
            let text = fs::read_to_string(&journal)?;
            let session: Session =
                serde_json::from_str(&text).map_err(|e| PipelineError::Backup {
                    path: journal.clone(),
                    reason: format!("unreadable session journal: {}", e),
                })?;
            sessions.push(session);
        }
        Ok(sessions)
    }

    fn restore(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(&session.id);
        for file in &session.backups {
            let backup_path = dir.join(&file.backup);
            if !backup_path.exists() {
                return Err(PipelineError::Backup {
                    path: backup_path,
                    reason: "backup copy is missing".to_string(),
                });
            }
            let digest = sha256_file(&backup_path)?;
            if digest != file.sha256 {
                return Err(PipelineError::Backup {
                    path: backup_path,
                    reason: format!(
                        "digest mismatch: journal has {}, copy is {}",
                        file.sha256, digest
                    ),
                });
            }
        }
        // All copies verified; now it is safe to start overwriting. A live
        // file whose digest still matches was never touched and is skipped.
        for file in &session.backups {
            let backup_path = dir.join(&file.backup);
            if file.original.exists() && sha256_file(&file.original)? == file.sha256 {
                continue;
            }
            if let Some(parent) = file.original.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&backup_path, &file.original).map_err(|e| PipelineError::Backup {
                path: file.original.clone(),
                reason: e.to_string(),
            })?;
        }
        for path in session.absent_at_start.iter().chain(&session.new_files) {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    fn sweep_journalless_dirs(&self) -> Result<()> {
        if !self.backup_root.exists() {
            return Ok(());
        }
        for entry in fs::read_dir(&self.backup_root)? {
            let path = entry?.path();
            if path.is_dir() && !path.join(JOURNAL_FILE).exists() {
                fs::remove_dir_all(&path)?;
            }
        }
        Ok(())
    }

    fn session_dir(&self, session_id: &str) -> PathBuf {
        self.backup_root.join(session_id)
    }

    fn write_journal(&self, session: &Session) -> Result<()> {
        let dir = self.session_dir(&session.id);
        let tmp = dir.join("session.json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(session)?)?;
        fs::rename(&tmp, dir.join(JOURNAL_FILE))?;
        Ok(())
    }

    fn read_journal(&self, session_id: &str) -> Result<Option<Session>> {
        let journal = self.session_dir(session_id).join(JOURNAL_FILE);
        if !journal.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&journal)?;
        let session = serde_json::from_str(&text).map_err(|e| PipelineError::Backup {
            path: journal,
            reason: format!("unreadable session journal: {}", e),
        })?;
        Ok(Some(session))
    }
}

fn new_session_id(phase: u8) -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("phase{}-{}-{}", phase, stamp, &suffix[..8])
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn two_phase_map(data: &Path) -> PhaseFileMap {
        let mut entries = BTreeMap::new();
        entries.insert(1, vec![data.join("dataset.csv")]);
        entries.insert(2, vec![data.join("dataset.csv"), data.join("report.json")]);
        PhaseFileMap::new(2, entries).unwrap()
    }

    fn manager(dir: &TempDir) -> RollbackManager {
        let map = two_phase_map(dir.path());
        RollbackManager::new(map, 2, &dir.path().join(".backups"))
    }

    #[test]
    fn map_requires_every_phase() {
        let mut entries = BTreeMap::new();
        entries.insert(1, vec![PathBuf::from("a.csv")]);
        entries.insert(3, Vec::new());
        let err = PhaseFileMap::new(3, entries).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn rollback_restores_exact_bytes() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("dataset.csv");
        fs::write(&dataset, "col1,col2\n1,2\n").unwrap();

        let mut mgr = manager(&dir);
        let id = mgr.begin_phase(1).unwrap();
        fs::write(&dataset, "bad,data\n3,4\n").unwrap();
        mgr.rollback(&id).unwrap();

        assert_eq!(fs::read_to_string(&dataset).unwrap(), "col1,col2\n1,2\n");
        assert!(mgr.active_session().is_none());
    }

    #[test]
    fn commit_keeps_changes_and_discards_backups() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("dataset.csv");
        fs::write(&dataset, "old").unwrap();

        let mut mgr = manager(&dir);
        let id = mgr.begin_phase(1).unwrap();
        fs::write(&dataset, "new").unwrap();
        mgr.commit(&id).unwrap();

        assert_eq!(fs::read_to_string(&dataset).unwrap(), "new");
        assert!(!dir.path().join(".backups").join(&id).exists());
        // A later rollback of a committed session must not undo anything.
        mgr.rollback(&id).unwrap();
        assert_eq!(fs::read_to_string(&dataset).unwrap(), "new");
    }

    #[test]
    fn rollback_removes_files_created_during_phase() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("dataset.csv");
        let report = dir.path().join("report.json");
        fs::write(&dataset, "d").unwrap();
        // report.json is mapped for phase 2 but does not exist yet.

        let mut mgr = manager(&dir);
        let id = mgr.begin_phase(2).unwrap();
        fs::write(&report, "{}").unwrap();
        let extra = dir.path().join("extra.json");
        fs::write(&extra, "x").unwrap();
        mgr.track_new_file(&id, &extra).unwrap();

        mgr.rollback(&id).unwrap();
        assert!(!report.exists(), "file absent at start must be deleted");
        assert!(!extra.exists(), "tracked new file must be deleted");
        assert_eq!(fs::read_to_string(&dataset).unwrap(), "d");
    }

    #[test]
    fn second_begin_without_resolution_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dataset.csv"), "d").unwrap();

        let mut mgr = manager(&dir);
        assert!(mgr.active_phase().is_none());
        let id = mgr.begin_phase(1).unwrap();
        assert_eq!(mgr.active_phase(), Some(1));
        assert_eq!(mgr.active_session().map(|s| s.id.as_str()), Some(id.as_str()));
        let err = mgr.begin_phase(2).unwrap_err();
        match err {
            PipelineError::SessionConflict { active, requested } => {
                assert_eq!(active, id);
                assert_eq!(requested, 2);
            }
            other => panic!("expected SessionConflict, got {:?}", other),
        }
    }

    #[test]
    fn resolving_with_wrong_id_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("dataset.csv"), "d").unwrap();

        let mut mgr = manager(&dir);
        let id = mgr.begin_phase(1).unwrap();
        assert!(matches!(
            mgr.commit("phase1-other"),
            Err(PipelineError::SessionMismatch { .. })
        ));
        assert!(matches!(
            mgr.rollback("phase1-other"),
            Err(PipelineError::SessionMismatch { .. })
        ));
        mgr.commit(&id).unwrap();
    }

    #[test]
    fn rollback_of_unknown_session_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut mgr = manager(&dir);
        mgr.rollback("phase1-never-existed").unwrap();
    }

    #[test]
    fn journal_recovery_restores_after_crash() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("dataset.csv");
        fs::write(&dataset, "col1,col2\n1,2\n").unwrap();

        // First process opens a session, mutates the file, and dies without
        // resolving. Dropping the manager simulates the crash.
        {
            let mut mgr = manager(&dir);
            mgr.begin_phase(1).unwrap();
            fs::write(&dataset, "half-written").unwrap();
        }

        let mut mgr = manager(&dir);
        let recovered = mgr.recover_stale_sessions().unwrap();
        assert_eq!(recovered.len(), 1);
        assert!(recovered[0].starts_with("phase1-"));
        assert_eq!(fs::read_to_string(&dataset).unwrap(), "col1,col2\n1,2\n");

        // A second recovery pass finds nothing.
        assert!(mgr.recover_stale_sessions().unwrap().is_empty());
    }

    #[test]
    fn begin_refuses_while_stale_journal_exists() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("dataset.csv");
        fs::write(&dataset, "d").unwrap();

        {
            let mut mgr = manager(&dir);
            mgr.begin_phase(1).unwrap();
        }

        let mut mgr = manager(&dir);
        let err = mgr.begin_phase(1).unwrap_err();
        assert!(matches!(err, PipelineError::SessionConflict { .. }));
    }

    #[test]
    fn corrupt_backup_blocks_restore() {
        let dir = TempDir::new().unwrap();
        let dataset = dir.path().join("dataset.csv");
        fs::write(&dataset, "pristine").unwrap();

        let mut mgr = manager(&dir);
        let id = mgr.begin_phase(1).unwrap();
        fs::write(&dataset, "mutated").unwrap();

        // Tamper with the backup copy behind the manager's back.
        let copy = dir.path().join(".backups").join(&id).join("f0.bak");
        fs::write(&copy, "tampered").unwrap();

        let err = mgr.rollback(&id).unwrap_err();
        assert!(matches!(err, PipelineError::Backup { .. }));
        // The live file must not have been overwritten from a bad copy.
        assert_eq!(fs::read_to_string(&dataset).unwrap(), "mutated");
    }
}
