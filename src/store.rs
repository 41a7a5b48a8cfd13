use std::collections::HashMap;

use parking_lot::RwLock;

use crate::datatypes::JobRecord;

/// Job records keyed by job id
///
/// Each record has a single writer, the runner executing that job. `update`
/// applies its closure under one write lock so readers see either the old or
/// the new record, never a mix.
pub trait JobStore: Send + Sync {
    fn get(&self, job_id: &str) -> Option<JobRecord>;

    fn put(&self, record: JobRecord);

    /// Mutates the record if present. Returns false for an unknown id.
    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut JobRecord)) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> InMemoryJobStore {
        InMemoryJobStore::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl JobStore for InMemoryJobStore {
    fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.jobs.read().get(job_id).cloned()
    }

    fn put(&self, record: JobRecord) {
        self.jobs.write().insert(record.id.clone(), record);
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut JobRecord)) -> bool {
        match self.jobs.write().get_mut(job_id) {
            Some(record) => {
                apply(record);
                true
            }
            None => false,
        }
    }
}
