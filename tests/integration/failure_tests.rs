use dupetree::duplicates::{
    DuplicateFinder, DuplicateGroup, FinderConfig, FinderError, ScanSummary,
};
use dupetree::progress::{ProgressCallback, PHASE_HASH, PHASE_SCAN};
use dupetree::scanner::{FileEntry, HashError, ScanError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

type FindResult = Result<(Vec<DuplicateGroup>, ScanSummary), FinderError>;

/// Upper bound for a run that must end on its own.
const RUN_TIMEOUT: Duration = Duration::from_secs(10);

/// Run `find_duplicates` on a side thread, failing if it does not return.
fn find_with_timeout(finder: DuplicateFinder, root: &Path) -> FindResult {
    let root = root.to_path_buf();
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(finder.find_duplicates(&root));
    });
    rx.recv_timeout(RUN_TIMEOUT)
        .expect("find_duplicates did not return in time")
}

/// What [`PhaseTrigger`] does on the first progress tick of its phase.
enum Action {
    Shutdown(Arc<AtomicBool>),
    Panic,
}

/// Progress callback that acts once a chosen phase reports progress.
struct PhaseTrigger {
    phase: &'static str,
    action: Action,
    current: Mutex<String>,
    ticks: AtomicUsize,
}

impl PhaseTrigger {
    fn new(phase: &'static str, action: Action) -> Self {
        Self {
            phase,
            action,
            current: Mutex::new(String::new()),
            ticks: AtomicUsize::new(0),
        }
    }
}

impl ProgressCallback for PhaseTrigger {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        *self.current.lock().unwrap() = phase.to_string();
    }

    fn on_progress(&self, _current: usize, _path: &str) {
        if *self.current.lock().unwrap() != self.phase {
            return;
        }
        self.ticks.fetch_add(1, Ordering::SeqCst);
        match &self.action {
            Action::Shutdown(flag) => flag.store(true, Ordering::SeqCst),
            Action::Panic => panic!("progress callback failed in {} phase", self.phase),
        }
    }

    fn on_phase_end(&self, _phase: &str) {}
}

/// Tree of `dirs` directories, each holding two identical files.
fn duplicate_tree(dirs: usize) -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    for i in 0..dirs {
        let sub = dir.path().join(format!("d{i:03}"));
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("one.txt"), format!("content {i:03}")).unwrap();
        fs::write(sub.join("two.txt"), format!("content {i:03}")).unwrap();
    }
    dir
}

#[test]
fn test_unreadable_candidates_are_isolated() {
    let dir = tempdir().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, b"pair").unwrap();
    fs::write(&b, b"pair").unwrap();

    let files = vec![
        FileEntry::new(a.clone(), 4),
        FileEntry::new(b.clone(), 4),
        FileEntry::new(PathBuf::from("nonexistent_1.txt"), 4),
        FileEntry::new(PathBuf::from("nonexistent_2.txt"), 4),
    ];

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates_from_files(files)
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths(), vec![a, b]);
    assert_eq!(summary.failures.len(), 2);
    for err in &summary.failures {
        match err {
            ScanError::Hash(HashError::Open { .. }) => {}
            other => panic!("Expected open failure, got: {other:?}"),
        }
    }
}

#[test]
fn test_strict_mode_fails_on_first_error() {
    let config = FinderConfig::default().with_strict(true);
    let finder = DuplicateFinder::new(config);
    let files = vec![
        FileEntry::new(PathBuf::from("nonexistent_1.txt"), 100),
        FileEntry::new(PathBuf::from("nonexistent_2.txt"), 100),
    ];

    match finder.find_duplicates_from_files(files) {
        Err(FinderError::Scan(ScanError::Hash(HashError::Open { path, .. }))) => {
            assert!(path.starts_with("nonexistent_"));
        }
        other => panic!("Expected strict open failure, got: {other:?}"),
    }
}

#[test]
fn test_missing_root() {
    let dir = tempdir().unwrap();
    let result = DuplicateFinder::with_defaults().find_duplicates(&dir.path().join("absent"));
    assert!(matches!(result, Err(FinderError::PathNotFound(_))));
}

#[test]
fn test_interrupted_run() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), b"x").unwrap();
    fs::write(dir.path().join("b"), b"x").unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let finder = DuplicateFinder::new(FinderConfig::default().with_shutdown_flag(flag));

    assert!(matches!(
        finder.find_duplicates(dir.path()),
        Err(FinderError::Interrupted)
    ));
    assert!(matches!(
        finder.find_duplicates_from_files(Vec::new()),
        Err(FinderError::Interrupted)
    ));
}

#[test]
fn test_shutdown_during_scan_is_interrupted() {
    let dir = duplicate_tree(50);
    let flag = Arc::new(AtomicBool::new(false));
    let trigger = Arc::new(PhaseTrigger::new(
        PHASE_SCAN,
        Action::Shutdown(Arc::clone(&flag)),
    ));
    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_scan_workers(1)
            .with_shutdown_flag(Arc::clone(&flag))
            .with_progress_callback(Arc::clone(&trigger) as Arc<dyn ProgressCallback>),
    );

    let result = find_with_timeout(finder, dir.path());

    assert!(matches!(result, Err(FinderError::Interrupted)), "{result:?}");
    assert!(flag.load(Ordering::SeqCst));
    // Remaining directories are retired without being listed.
    assert!(trigger.ticks.load(Ordering::SeqCst) < 100);
}

#[test]
fn test_shutdown_during_hash_discards_remaining_jobs() {
    let dir = duplicate_tree(150);
    let flag = Arc::new(AtomicBool::new(false));
    let trigger = Arc::new(PhaseTrigger::new(
        PHASE_HASH,
        Action::Shutdown(Arc::clone(&flag)),
    ));
    let finder = DuplicateFinder::new(
        FinderConfig::default()
            .with_hash_workers(1)
            .with_shutdown_flag(Arc::clone(&flag))
            .with_progress_callback(Arc::clone(&trigger) as Arc<dyn ProgressCallback>),
    );

    let result = find_with_timeout(finder, dir.path());

    assert!(matches!(result, Err(FinderError::Interrupted)), "{result:?}");
    // The single hasher stops opening files after the first one.
    assert_eq!(trigger.ticks.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panic_in_scanner_pool_is_reported() {
    let dir = duplicate_tree(3);
    for workers in [1, 4] {
        let finder = DuplicateFinder::new(
            FinderConfig::default()
                .with_scan_workers(workers)
                .with_progress_callback(Arc::new(PhaseTrigger::new(PHASE_SCAN, Action::Panic))),
        );

        match find_with_timeout(finder, dir.path()) {
            Err(FinderError::WorkerPanicked(stage)) => assert_eq!(stage, "scanner pool"),
            other => panic!("Expected scanner panic, got: {other:?}"),
        }
    }
}

#[test]
fn test_panic_in_hasher_pool_is_reported() {
    let dir = duplicate_tree(150);
    for workers in [1, 4] {
        let finder = DuplicateFinder::new(
            FinderConfig::default()
                .with_hash_workers(workers)
                .with_progress_callback(Arc::new(PhaseTrigger::new(PHASE_HASH, Action::Panic))),
        );

        match find_with_timeout(finder, dir.path()) {
            Err(FinderError::WorkerPanicked(stage)) => assert_eq!(stage, "hasher pool"),
            other => panic!("Expected hasher panic, got: {other:?}"),
        }
    }
}

#[cfg(unix)]
mod permissions {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn set_mode(path: &std::path::Path, mode: u32) {
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn test_unreadable_file_reported_with_genuine_pair() {
        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked.txt");
        fs::write(dir.path().join("a.txt"), b"pair").unwrap();
        fs::write(dir.path().join("b.txt"), b"pair").unwrap();
        fs::write(&locked, b"lock").unwrap();
        set_mode(&locked, 0o000);

        if fs::File::open(&locked).is_ok() {
            // Privileged users bypass file modes.
            set_mode(&locked, 0o644);
            return;
        }

        let result = DuplicateFinder::with_defaults().find_duplicates(dir.path());
        set_mode(&locked, 0o644);
        let (groups, summary) = result.unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].paths(),
            vec![dir.path().join("a.txt"), dir.path().join("b.txt")]
        );
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].kind(), "file-open");
        assert_eq!(summary.failures[0].path(), locked.as_path());
    }

    #[test]
    fn test_unreadable_directory_does_not_stop_siblings() {
        let dir = tempdir().unwrap();
        let locked = dir.path().join("locked");
        let open = dir.path().join("open");
        fs::create_dir(&locked).unwrap();
        fs::create_dir(&open).unwrap();
        fs::write(locked.join("hidden.txt"), b"dup").unwrap();
        fs::write(open.join("one.txt"), b"dup").unwrap();
        fs::write(open.join("two.txt"), b"dup").unwrap();
        set_mode(&locked, 0o000);

        if fs::read_dir(&locked).is_ok() {
            set_mode(&locked, 0o755);
            return;
        }

        let result = DuplicateFinder::with_defaults().find_duplicates(dir.path());
        let strict = DuplicateFinder::new(FinderConfig::default().with_strict(true))
            .find_duplicates(dir.path());
        set_mode(&locked, 0o755);

        let (groups, summary) = result.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].kind(), "directory-open");

        match strict {
            Err(FinderError::Scan(err)) => assert_eq!(err.path(), locked.as_path()),
            other => panic!("Expected strict directory failure, got: {other:?}"),
        }
    }
}
