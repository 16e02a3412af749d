use crate::error::{PublicError, PublicResult};
use crate::repository::ItemStore;
use std::time::Instant;

/// TaskStatus
///
/// Lifecycle of one public operation: `New -> Running -> Ok`, or `New -> Running -> Failed`.
/// There are no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    New,
    Running,
    Ok,
    Failed,
}

/// TaskRun
///
/// Tracks and logs the status of one operation. The operation's steps themselves are plain
/// function calls sharing one store; `finish` closes the store: commit on success, drop
/// (rollback) on failure.
#[derive(Debug)]
pub struct TaskRun {
    name: &'static str,
    status: TaskStatus,
    started: Option<Instant>,
}

impl TaskRun {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            status: TaskStatus::New,
            started: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Running;
        self.started = Some(Instant::now());
        tracing::debug!(task = self.name, "task running");
    }

    /// Records the outcome of the operation without touching storage.
    pub fn complete<T>(&mut self, result: PublicResult<T>) -> PublicResult<T> {
        let elapsed_ms = self
            .started
            .map(|started| started.elapsed().as_millis() as u64)
            .unwrap_or_default();
        match &result {
            Ok(_) => {
                self.status = TaskStatus::Ok;
                tracing::debug!(task = self.name, elapsed_ms, "task ok");
            }
            Err(PublicError::Database(e)) => {
                self.status = TaskStatus::Failed;
                tracing::error!(task = self.name, elapsed_ms, error = %e, "task failed");
            }
            Err(e) => {
                self.status = TaskStatus::Failed;
                tracing::warn!(task = self.name, elapsed_ms, code = e.code(), "task failed: {}", e);
            }
        }
        result
    }

    /// Passes an opened store through. A store that failed to open fails the task.
    pub fn opened(
        &mut self,
        store: PublicResult<Box<dyn ItemStore>>,
    ) -> PublicResult<Box<dyn ItemStore>> {
        match store {
            Ok(store) => Ok(store),
            Err(e) => self.complete(Err(e)),
        }
    }

    /// Records the outcome and closes the store. A failing commit fails the task.
    pub async fn finish<T>(
        mut self,
        store: Box<dyn ItemStore>,
        result: PublicResult<T>,
    ) -> PublicResult<T> {
        let result = match result {
            Ok(value) => store.commit().await.map(|_| value),
            Err(e) => Err(e),
        };
        self.complete(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn successful_run_ends_ok() {
        let mut task = TaskRun::new("get-one");
        assert_eq!(task.status(), TaskStatus::New);

        task.start();
        assert_eq!(task.status(), TaskStatus::Running);

        let result = task.complete(Ok::<_, PublicError>(3));
        assert_eq!(result.unwrap(), 3);
        assert_eq!(task.status(), TaskStatus::Ok);
    }

    #[test]
    fn failed_run_keeps_the_error() {
        let id = Uuid::new_v4();
        let mut task = TaskRun::new("get-one");
        task.start();

        let result = task.complete::<()>(Err(PublicError::ItemNotPublic(id)));

        assert!(matches!(result, Err(PublicError::ItemNotPublic(failed)) if failed == id));
        assert_eq!(task.status(), TaskStatus::Failed);
    }

    #[test]
    fn store_that_cannot_open_fails_the_run() {
        let mut task = TaskRun::new("get-one");
        task.start();

        let store = task.opened(Err(sqlx::Error::PoolTimedOut.into()));

        assert!(matches!(store, Err(PublicError::Database(_))));
        assert_eq!(task.status(), TaskStatus::Failed);
    }
}
