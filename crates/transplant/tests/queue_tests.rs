//! Tests for deleting queued jobs together with their scanned torrent files.

mod common;

use common::{write_torrent_file, TestHarness, TorrentBuilder};
use transplant::job::{jobs_from_paths, scan_directory};
use transplant::{Job, JobQueue, Tracker};

#[test]
fn test_delete_removes_only_scanned_files() {
    let harness = TestHarness::new();
    let scanned_bytes = TorrentBuilder::new("Scanned").file("s.flac", b"s").build_in(&harness.elsewhere_dir);
    let picked_bytes = TorrentBuilder::new("Picked").file("p.flac", b"p").build_in(&harness.elsewhere_dir);

    let scanned_path = write_torrent_file(&harness.scan_dir, "scanned.torrent", &scanned_bytes);
    let picked_path = write_torrent_file(harness.path(), "picked.torrent", &picked_bytes);

    let queue = JobQueue::new();
    queue.append_jobs(scan_directory(&harness.scan_dir));
    queue.append_jobs(jobs_from_paths([picked_path.clone()], false));
    queue.append(Job::from_id(Tracker::Red, 5));
    assert_eq!(queue.len(), 3);

    let ids: Vec<String> = queue.snapshot().into_iter().map(|j| j.id).collect();
    let report = queue.delete_jobs(&ids);

    assert_eq!(report.deleted, 1);
    assert_eq!(report.non_scanned, 2);
    assert!(report.errors.is_empty());
    assert!(!scanned_path.exists());
    assert!(picked_path.exists());
    assert_eq!(queue.len(), 2);
    assert!(queue.snapshot().iter().all(|j| !j.scanned));
}

#[test]
fn test_delete_tolerates_already_missing_file() {
    let harness = TestHarness::new();
    let bytes = TorrentBuilder::new("Gone").file("g.flac", b"g").build_in(&harness.elsewhere_dir);
    let path = write_torrent_file(&harness.scan_dir, "gone.torrent", &bytes);

    let queue = JobQueue::new();
    queue.append_jobs(scan_directory(&harness.scan_dir));
    std::fs::remove_file(&path).unwrap();

    let ids: Vec<String> = queue.snapshot().into_iter().map(|j| j.id).collect();
    let report = queue.delete_jobs(&ids);

    assert_eq!(report.deleted, 1);
    assert!(report.errors.is_empty());
    assert!(queue.is_empty());
}

#[test]
fn test_delete_ignores_unselected_jobs() {
    let harness = TestHarness::new();
    let bytes = TorrentBuilder::new("Kept").file("k.flac", b"k").build_in(&harness.elsewhere_dir);
    let path = write_torrent_file(&harness.scan_dir, "kept.torrent", &bytes);

    let queue = JobQueue::new();
    queue.append_jobs(scan_directory(&harness.scan_dir));

    let report = queue.delete_jobs(&["not-a-job-id".to_string()]);

    assert_eq!(report.deleted, 0);
    assert_eq!(report.non_scanned, 0);
    assert!(path.exists());
    assert_eq!(queue.len(), 1);
}
