//! Tests for turning pasted text, files and scanned directories into queued jobs.

mod common;

use common::{write_torrent_file, TestHarness, TorrentBuilder};
use transplant::job::{jobs_from_paths, parse_paste, scan_directory};
use transplant::{Job, JobQueue, Tracker};

#[test]
fn test_numeric_paste_uses_selected_tracker() {
    for selected in Tracker::ALL {
        let jobs = parse_paste("1\n 22\t333  4444", selected);
        assert_eq!(jobs.len(), 4);
        assert!(jobs.iter().all(|j| j.src_tracker == selected));
        let ids: Vec<u64> = jobs.iter().filter_map(|j| j.tor_id).collect();
        assert_eq!(ids, vec![1, 22, 333, 4444]);
    }
}

#[test]
fn test_url_paste_extracts_domain_and_id() {
    let blob = "https://redacted.sh/torrents.php?id=10&torrentid=55 \
                https://orpheus.network/torrents.php?torrentid=66#torrent66";
    let jobs = parse_paste(blob, Tracker::Red);

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].src_tracker, Tracker::Red);
    assert_eq!(jobs[0].tor_id, Some(55));
    assert_eq!(jobs[0].src_domain.as_deref(), Some("redacted.sh"));
    assert_eq!(jobs[1].src_tracker, Tracker::Ops);
    assert_eq!(jobs[1].tor_id, Some(66));
}

#[test]
fn test_malformed_urls_are_skipped() {
    let blob = "https://example.com/torrents.php?torrentid=5 \
                https://redacted.sh/torrents.php?id=5 \
                https://redacted.sh/torrents.php?torrentid=99999999999999999999999 \
                torrentid=7 \
                hello \
                12";
    let jobs = parse_paste(blob, Tracker::Ops);

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].tor_id, Some(12));
    assert_eq!(jobs[0].src_tracker, Tracker::Ops);
}

#[test]
fn test_pasted_torrent_path_is_not_scanned() {
    let harness = TestHarness::new();
    let bytes = TorrentBuilder::new("Pasted").file("a.flac", b"aaaa").build_in(&harness.elsewhere_dir);
    let path = write_torrent_file(harness.path(), "pasted.torrent", &bytes);

    let jobs = parse_paste(&path.to_string_lossy(), Tracker::Ops);

    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].src_tracker, Tracker::Red);
    assert!(!jobs[0].scanned);
    assert_eq!(jobs[0].display_name.as_deref(), Some("Pasted"));
}

#[test]
fn test_duplicate_append_leaves_queue_unchanged() {
    let queue = JobQueue::new();
    queue.append_jobs(parse_paste("100 200", Tracker::Red));
    assert_eq!(queue.len(), 2);

    assert!(!queue.append(Job::from_id(Tracker::Red, 100)));
    let from_url = Job::from_url("redacted.ch", 200).unwrap();
    assert!(!queue.append(from_url));
    assert_eq!(queue.len(), 2);

    assert!(queue.append(Job::from_id(Tracker::Ops, 100)));
    assert_eq!(queue.len(), 3);
}

#[test]
fn test_directory_scan_skips_already_queued_torrent() {
    let harness = TestHarness::new();
    let first = TorrentBuilder::new("First").file("1.flac", b"one").build_in(&harness.elsewhere_dir);
    let second = TorrentBuilder::new("Second").file("2.flac", b"two").build_in(&harness.elsewhere_dir);
    let third = TorrentBuilder::new("Third").file("3.flac", b"three").build_in(&harness.elsewhere_dir);

    let queue = JobQueue::new();
    let picked = write_torrent_file(&harness.path().join("picked"), "first.torrent", &first);
    queue.append_jobs(jobs_from_paths([picked], false));
    assert_eq!(queue.len(), 1);

    write_torrent_file(&harness.scan_dir, "a.torrent", &first);
    write_torrent_file(&harness.scan_dir, "b.torrent", &second);
    write_torrent_file(&harness.scan_dir, "c.torrent", &third);
    write_torrent_file(&harness.scan_dir, "notes.txt", b"not a torrent");

    let scanned = scan_directory(&harness.scan_dir);
    assert_eq!(scanned.len(), 3);
    assert!(scanned.iter().all(|j| j.scanned));

    let added = queue.append_jobs(scanned);
    assert_eq!(added, 2);
    assert_eq!(queue.len(), 3);
}

#[test]
fn test_unusable_files_are_skipped() {
    let harness = TestHarness::new();
    let broken = write_torrent_file(harness.path(), "broken.torrent", b"not bencode");
    let wrong_ext = write_torrent_file(harness.path(), "readme.txt", b"text");
    let missing = harness.path().join("missing.torrent");

    let jobs = jobs_from_paths([broken, wrong_ext, missing], true);
    assert!(jobs.is_empty());
}
