use dupetree::duplicates::{DuplicateFinder, DuplicateGroup, FinderConfig};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(path: &Path, content: &[u8]) {
    File::create(path).unwrap().write_all(content).unwrap();
}

fn membership(groups: &[DuplicateGroup]) -> BTreeSet<BTreeSet<PathBuf>> {
    groups
        .iter()
        .map(|g| g.paths().into_iter().collect())
        .collect()
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 0);
    assert_eq!(summary.hash_jobs, 0);
    assert!(summary.failures.is_empty());
}

#[test]
fn test_scan_single_file() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("only.txt"), b"alone");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.total_files, 1);
    assert_eq!(summary.hash_jobs, 0);
}

#[test]
fn test_hello_world_scenario() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.txt"), b"hello");
    write(&dir.path().join("b.txt"), b"hello");
    write(&dir.path().join("c.txt"), b"world!");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].digest, blake3::hash(b"hello").to_hex().to_string());
    assert_eq!(groups[0].size, 5);
    assert_eq!(
        groups[0].paths(),
        vec![dir.path().join("a.txt"), dir.path().join("b.txt")]
    );
    // c.txt has a unique size and is never opened.
    assert_eq!(summary.hash_jobs, 2);
    assert_eq!(summary.eliminated_by_size, 1);
}

#[test]
fn test_equal_size_different_content() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("a.bin"), b"abcd");
    write(&dir.path().join("b.bin"), b"abce");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert!(groups.is_empty());
    assert_eq!(summary.hash_jobs, 2);
}

#[test]
fn test_duplicate_pair_five_levels_deep() {
    let dir = tempdir().unwrap();
    let deep = dir.path().join("l1/l2/l3/l4/l5");
    fs::create_dir_all(&deep).unwrap();
    write(&deep.join("x.dat"), b"deep content");
    write(&dir.path().join("l1/y.dat"), b"deep content");
    write(&dir.path().join("l1/l2/other.dat"), b"something else entirely");

    for workers in [1, 3, 16] {
        let finder = DuplicateFinder::new(
            FinderConfig::default()
                .with_scan_workers(workers)
                .with_hash_workers(workers),
        );
        let (groups, _) = finder.find_duplicates(dir.path()).unwrap();

        assert_eq!(groups.len(), 1, "workers = {workers}");
        assert_eq!(
            groups[0].paths(),
            vec![dir.path().join("l1/l2/l3/l4/l5/x.dat"), dir.path().join("l1/y.dat")]
        );
    }
}

#[test]
fn test_multiple_groups_and_triples() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    write(&dir.path().join("a1"), b"aaaa");
    write(&dir.path().join("sub/a2"), b"aaaa");
    write(&dir.path().join("sub/a3"), b"aaaa");
    write(&dir.path().join("b1"), b"bbbb");
    write(&dir.path().join("sub/b2"), b"bbbb");

    let (groups, summary) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(summary.duplicate_files, 3);
    assert_eq!(summary.reclaimable_space, 12);
    let sizes: Vec<usize> = groups.iter().map(DuplicateGroup::len).collect();
    assert!(sizes.contains(&3) && sizes.contains(&2));
    // Sorted by digest.
    assert!(groups[0].digest < groups[1].digest);
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempdir().unwrap();
    for i in 0..30 {
        let sub = dir.path().join(format!("d{}", i % 4));
        fs::create_dir_all(&sub).unwrap();
        write(&sub.join(format!("f{i}")), format!("v{}", i % 7).as_bytes());
    }

    let finder = DuplicateFinder::with_defaults();
    let (first, _) = finder.find_duplicates(dir.path()).unwrap();
    let (second, _) = finder.find_duplicates(dir.path()).unwrap();

    assert!(!first.is_empty());
    assert_eq!(membership(&first), membership(&second));
}

#[test]
fn test_empty_files_are_duplicates_of_each_other() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("e1"), b"");
    write(&dir.path().join("e2"), b"");

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 0);
    assert_eq!(groups[0].digest, blake3::hash(b"").to_hex().to_string());
}

#[test]
fn test_min_size_skips_small_files() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("s1"), b"ab");
    write(&dir.path().join("s2"), b"ab");
    write(&dir.path().join("l1"), b"abcdefgh");
    write(&dir.path().join("l2"), b"abcdefgh");

    let finder = DuplicateFinder::new(FinderConfig::default().with_min_size(Some(4)));
    let (groups, summary) = finder.find_duplicates(dir.path()).unwrap();

    assert_eq!(summary.total_files, 2);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].size, 8);
}

#[cfg(unix)]
#[test]
fn test_symlinked_file_only_counted_when_followed() {
    let dir = tempdir().unwrap();
    write(&dir.path().join("real.txt"), b"linked");
    std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("alias.txt")).unwrap();

    let (groups, _) = DuplicateFinder::with_defaults()
        .find_duplicates(dir.path())
        .unwrap();
    assert!(groups.is_empty());

    let finder = DuplicateFinder::new(FinderConfig::default().with_follow_symlinks(true));
    let (groups, _) = finder.find_duplicates(dir.path()).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].len(), 2);
}
