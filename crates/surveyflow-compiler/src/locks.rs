use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use surveyflow_store::SurveyId;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Survey-scoped exclusive locks.
///
/// Holding the guard for a survey keeps every other replace of that survey
/// waiting; replaces of different surveys proceed independently.
#[derive(Debug, Default)]
pub struct SurveyLocks {
  locks: Mutex<HashMap<SurveyId, Arc<AsyncMutex<()>>>>,
}

impl SurveyLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wait for exclusive access to `survey_id`.
  pub async fn acquire(&self, survey_id: SurveyId) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      // Entries nobody holds or waits on can go
      locks.retain(|_, lock| Arc::strong_count(lock) > 1);
      locks.entry(survey_id).or_default().clone()
    };
    lock.lock_owned().await
  }

  /// Number of surveys currently locked or waited on.
  pub fn active(&self) -> usize {
    self
      .locks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .values()
      .filter(|lock| Arc::strong_count(lock) > 1)
      .count()
  }
}
