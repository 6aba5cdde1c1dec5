//! Sub-result cache
//!
//! Maps the stable key of a sub-job (the name of the submitted item) to the
//! shared [`Job`] handle tracking it. The same key always yields the same
//! handle, so callers holding a sub-job see it progress across polls.
//! Entries are never removed.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::RwLock;

use crate::handle::{read, write, Job};

#[derive(Default)]
pub struct JobsCache {
    entries: RwLock<BTreeMap<String, Job>>,
}

impl JobsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Job> {
        read(&self.entries).get(key).cloned()
    }

    /// Return the job cached under `key`, creating it with `make` if the key
    /// was never seen. The flag tells whether the job was just inserted.
    pub(crate) fn upsert(&self, key: &str, make: impl FnOnce() -> Job) -> (Job, bool) {
        let mut entries = write(&self.entries);
        if let Some(job) = entries.get(key) {
            return (job.clone(), false);
        }
        let job = make();
        entries.insert(key.to_string(), job.clone());
        (job, true)
    }

    /// Number of distinct keys seen so far.
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        read(&self.entries).keys().cloned().collect()
    }

    /// All cached jobs, ordered by key.
    pub fn snapshot(&self) -> Vec<(String, Job)> {
        read(&self.entries)
            .iter()
            .map(|(k, j)| (k.clone(), j.clone()))
            .collect()
    }

    /// Number of cached jobs whose report is final (graded or failed).
    pub fn finished_count(&self) -> u32 {
        let finished = read(&self.entries)
            .values()
            .filter(|job| job.state().is_terminal())
            .count();
        u32::try_from(finished).unwrap_or(u32::MAX)
    }
}

impl fmt::Debug for JobsCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::JobIdentity;

    fn sub_job(key: &str) -> Job {
        Job::new(
            JobIdentity {
                jobid: format!("J-{}", key),
                pathdir: "/s/batch/B1".to_string(),
                name: Some(key.to_string()),
                exercise: None,
                exercise_uuid: None,
                personid: None,
                archived: None,
            },
            None,
            None,
        )
    }

    #[test]
    fn test_same_key_same_handle() {
        let cache = JobsCache::new();
        let (first, inserted) = cache.upsert("one", || sub_job("one"));
        assert!(inserted);

        let (again, inserted) = cache.upsert("one", || sub_job("one"));
        assert!(!inserted);
        assert!(first.ptr_eq(&again));
        assert!(first.ptr_eq(&cache.get("one").unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_distinct_keys() {
        let cache = JobsCache::new();
        cache.upsert("two", || sub_job("two"));
        cache.upsert("one", || sub_job("one"));

        assert_eq!(cache.keys(), vec!["one".to_string(), "two".to_string()]);
        assert_eq!(cache.finished_count(), 0);
        assert!(cache.get("three").is_none());
    }
}
