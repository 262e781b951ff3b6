use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use super::Job;
use crate::error::StorageError;

/// The live job list shared by the front end and the batch worker.
///
/// Cloning yields another handle to the same list. The lock is held only for
/// a single lookup or mutation, never while a job is being processed. While a
/// batch runs the front end may add, remove or clear jobs, but must not edit
/// the attributes of queued jobs.
#[derive(Clone, Default)]
pub struct JobQueue {
    jobs: Arc<Mutex<Vec<Job>>>,
}

/// Result of deleting jobs together with their scanned torrent files.
#[derive(Debug, Default)]
pub struct DeleteReport {
    /// Jobs removed along with their file.
    pub deleted: usize,
    /// Selected jobs that were not found by a scan. They stay queued and
    /// their files are not touched.
    pub non_scanned: usize,
    pub errors: Vec<StorageError>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, Vec<Job>> {
        match self.jobs.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                warn!("Job queue lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Adds `job` unless an equal job is already queued.
    pub fn append(&self, job: Job) -> bool {
        let mut jobs = self.guard();
        if jobs.iter().any(|queued| queued.same_identity(&job)) {
            return false;
        }
        jobs.push(job);
        true
    }

    /// Returns how many of `new_jobs` were added.
    pub fn append_jobs(&self, new_jobs: impl IntoIterator<Item = Job>) -> usize {
        let added = new_jobs
            .into_iter()
            .filter(|job| self.append(job.clone()))
            .count();
        if added > 0 {
            info!("Queued {} job(s)", added);
        }
        added
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.guard().iter().any(|j| j.id == job_id)
    }

    pub fn remove(&self, job_id: &str) -> Option<Job> {
        let mut jobs = self.guard();
        let pos = jobs.iter().position(|j| j.id == job_id)?;
        Some(jobs.remove(pos))
    }

    /// Replaces the queued job with the same id. Returns false if it is gone.
    pub fn update(&self, job: &Job) -> bool {
        let mut jobs = self.guard();
        match jobs.iter_mut().find(|j| j.id == job.id) {
            Some(slot) => {
                *slot = job.clone();
                true
            }
            None => false,
        }
    }

    /// A copy of the current list, in queue order.
    pub fn snapshot(&self) -> Vec<Job> {
        self.guard().clone()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Deletes the torrent files of the selected scanned jobs and drops those
    /// jobs from the queue. Non-scanned jobs are only counted.
    pub fn delete_jobs(&self, job_ids: &[String]) -> DeleteReport {
        let selected: HashSet<&str> = job_ids.iter().map(String::as_str).collect();
        let mut report = DeleteReport::default();

        for job in self.snapshot().into_iter().filter(|j| selected.contains(j.id.as_str())) {
            let path = match (&job.torrent_path, job.scanned) {
                (Some(path), true) => path,
                _ => {
                    report.non_scanned += 1;
                    continue;
                }
            };

            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Scanned torrent already gone: {}", path.display());
                }
                Err(e) => {
                    report.errors.push(StorageError::RemoveFile {
                        path: path.clone(),
                        source: e,
                    });
                    continue;
                }
            }
            self.remove(&job.id);
            report.deleted += 1;
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::fixtures::write_torrent;
    use crate::tracker::Tracker;
    use tempfile::TempDir;

    #[test]
    fn test_duplicates_are_rejected() {
        let queue = JobQueue::new();
        assert!(queue.append(Job::from_id(Tracker::Red, 1)));
        assert!(!queue.append(Job::from_id(Tracker::Red, 1)));
        assert!(queue.append(Job::from_id(Tracker::Ops, 1)));
        assert_eq!(queue.len(), 2);

        let added = queue.append_jobs(vec![
            Job::from_id(Tracker::Red, 1),
            Job::from_id(Tracker::Red, 2),
            Job::from_id(Tracker::Red, 2),
        ]);
        assert_eq!(added, 1);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_clones_share_the_list() {
        let queue = JobQueue::new();
        let handle = queue.clone();
        let job = Job::from_id(Tracker::Red, 1);
        let id = job.id.clone();
        queue.append(job);

        assert!(handle.contains(&id));
        assert!(handle.remove(&id).is_some());
        assert!(!queue.contains(&id));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_update_replaces_queued_job() {
        let queue = JobQueue::new();
        let mut job = Job::from_id(Tracker::Red, 1);
        queue.append(job.clone());
        queue.append(Job::from_id(Tracker::Red, 2));

        job.display_name = Some("Resolved".to_string());
        assert!(queue.update(&job));
        assert_eq!(queue.snapshot()[0].display_name.as_deref(), Some("Resolved"));

        queue.remove(&job.id);
        assert_eq!(queue.len(), 1);
        assert!(!queue.update(&job));
    }

    #[test]
    fn test_snapshot_is_detached() {
        let queue = JobQueue::new();
        let job = Job::from_id(Tracker::Red, 1);
        queue.append(job.clone());
        let snapshot = queue.snapshot();
        queue.remove(&job.id);
        assert_eq!(snapshot.len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_delete_jobs_only_touches_scanned_files() {
        let temp = TempDir::new().unwrap();
        let scanned_path = write_torrent(temp.path(), "a", "https://flacsfor.me/k/announce", None);
        let picked_path = write_torrent(temp.path(), "b", "https://flacsfor.me/k/announce", None);

        let queue = JobQueue::new();
        let scanned = Job::from_torrent_file(&scanned_path, true).unwrap();
        let picked = Job::from_torrent_file(&picked_path, false).unwrap();
        let by_id = Job::from_id(Tracker::Red, 9);
        let ids = vec![scanned.id.clone(), picked.id.clone(), by_id.id.clone()];
        queue.append_jobs(vec![scanned, picked, by_id]);

        let report = queue.delete_jobs(&ids);

        assert_eq!(report.deleted, 1);
        assert_eq!(report.non_scanned, 2);
        assert!(report.errors.is_empty());
        assert!(!scanned_path.exists());
        assert!(picked_path.exists());
        assert_eq!(queue.len(), 2);
    }
}
