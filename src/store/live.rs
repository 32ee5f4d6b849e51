// LiveProgress - local mirror of one user's progress rows

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;

use super::{PracticeStore, StoreChange};
use crate::error::StoreError;
use crate::progress::{ProgressKey, ProgressRecord};

/// Keeps an up-to-date copy of a user's progress rows by following the
/// store's change feed. The follower task stops when this is dropped.
pub struct LiveProgress {
    user_id: String,
    records: Arc<Mutex<BTreeMap<ProgressKey, ProgressRecord>>>,
    task: JoinHandle<()>,
}

impl LiveProgress {
    /// Load the current rows and start following changes.
    ///
    /// The feed is opened before the initial read so no write falls between
    /// the two; replays are absorbed by the merge.
    pub async fn start(store: Arc<dyn PracticeStore>, user_id: &str) -> Result<Self, StoreError> {
        let mut feed = store.subscribe(user_id);
        let initial = store.progress_for_user(user_id)?;

        let records = Arc::new(Mutex::new(
            initial
                .into_iter()
                .map(|record| (record.key(), record))
                .collect::<BTreeMap<_, _>>(),
        ));

        let mirror = Arc::clone(&records);
        let task = tokio::spawn(async move {
            while let Some(change) = feed.next().await {
                if let StoreChange::Progress(record) = change {
                    if !apply_change(&mirror, record) {
                        break;
                    }
                }
            }
        });

        log::debug!("[LiveProgress] Following progress for {}", user_id);
        Ok(Self {
            user_id: user_id.to_string(),
            records,
            task,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Current rows, oldest date first
    pub fn records(&self) -> Vec<ProgressRecord> {
        let mut rows: Vec<ProgressRecord> = self
            .records
            .lock()
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.accent.cmp(&b.accent)));
        rows
    }

    pub fn record(&self, key: &ProgressKey) -> Option<ProgressRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|rows| rows.get(key).cloned())
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

fn apply_change(mirror: &Mutex<BTreeMap<ProgressKey, ProgressRecord>>, record: ProgressRecord) -> bool {
    let Ok(mut rows) = mirror.lock() else {
        return false;
    };
    rows.entry(record.key())
        .and_modify(|existing| {
            existing.merge(&record);
        })
        .or_insert(record);
    true
}

impl Drop for LiveProgress {
    fn drop(&mut self) {
        self.task.abort();
    }
}
