use super::job::{JobId, JobRecord};
use crate::Result;
use ohno::app_err;
use std::collections::HashMap;
use std::sync::Mutex;

/// Storage for job records, keyed by job id.
///
/// Implementations backed by an external service allow several coordinator
/// instances to share the registry.
pub trait JobStore: Send + Sync + 'static {
    fn get(&self, id: JobId) -> impl Future<Output = Result<Option<JobRecord>>> + Send;

    fn put(&self, record: JobRecord) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, id: JobId) -> impl Future<Output = Result<Option<JobRecord>>> + Send;
}

/// A process-local job registry.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, JobRecord>>,
}

impl MemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_jobs<T>(&self, f: impl FnOnce(&mut HashMap<JobId, JobRecord>) -> T) -> Result<T> {
        let mut jobs = self.jobs.lock().map_err(|_poisoned| app_err!("job registry lock poisoned"))?;
        Ok(f(&mut jobs))
    }
}

impl JobStore for MemoryJobStore {
    async fn get(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.with_jobs(|jobs| jobs.get(&id).cloned())
    }

    async fn put(&self, record: JobRecord) -> Result<()> {
        self.with_jobs(|jobs| {
            let _ = jobs.insert(record.id, record);
        })
    }

    async fn delete(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.with_jobs(|jobs| jobs.remove(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryJobStore::new();
        let record = JobRecord::new(JobId::new(), "https://github.com/o/r", "me");
        let id = record.id;

        assert!(store.get(id).await.unwrap().is_none());
        store.put(record.clone()).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Some(record.clone()));

        assert_eq!(store.delete(id).await.unwrap(), Some(record));
        assert!(store.get(id).await.unwrap().is_none());
        assert!(store.delete(id).await.unwrap().is_none());
    }
}
