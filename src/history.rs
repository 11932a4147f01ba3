//! # History Store
//!
//! Append-only log of past prescriptions, one per week.
//!
//! ## File Layout
//! - One JSON document: `{ prescriptions, currentWeek, weekStartDate }`
//! - Read whole at startup, rewritten whole after every append
//! - Writes go to `<file>.tmp` first and are renamed over the document, so a
//!   failed save leaves the previous document on disk
//! - Missing file is created empty; unreadable file falls back to an empty history
//! - Corrupt file is moved aside to `<file>.corrupt` before anything overwrites it
//!
//! ## Uniqueness
//! [`HistoryStore::append`] is an insert-if-absent on `weekKey`. The check and
//! the push happen under one lock, so two requests racing in the same week
//! cannot both land. The loser gets [`Appended::Conflict`].
//!
//! The lock is per process. Pointing two processes at the same file is not supported.
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, NaiveTime};
use tokio::{fs, sync::Mutex};
use tracing::{info, warn};

use crate::{
    error::AppError,
    models::{PrescriptionHistory, PrescriptionRecord},
    week::{localize, monday_of},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Appended {
    Inserted,
    Conflict(Box<PrescriptionRecord>),
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn snapshot(&self) -> PrescriptionHistory;

    async fn last(&self) -> Option<PrescriptionRecord> {
        self.snapshot().await.prescriptions.pop()
    }

    async fn append(&self, record: PrescriptionRecord) -> Result<Appended, AppError>;
}

pub struct JsonFileStore {
    path: PathBuf,
    history: Mutex<PrescriptionHistory>,
}

impl JsonFileStore {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();

        let history = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(history) => history,
                Err(e) => {
                    let aside = sibling(&path, "corrupt");
                    warn!(
                        "Corrupt history at {}: {e}, moving to {} and starting empty",
                        path.display(),
                        aside.display()
                    );

                    fs::rename(&path, &aside).await?;
                    PrescriptionHistory::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No history at {}, initializing", path.display());

                let history = PrescriptionHistory::default();
                persist(&path, &history).await?;
                history
            }
            Err(e) => {
                warn!("Failed to read history at {}: {e}, starting empty", path.display());
                PrescriptionHistory::default()
            }
        };

        info!("Loaded {} prescriptions", history.prescriptions.len());

        Ok(Self {
            path,
            history: Mutex::new(history),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl HistoryStore for JsonFileStore {
    async fn snapshot(&self) -> PrescriptionHistory {
        self.history.lock().await.clone()
    }

    async fn last(&self) -> Option<PrescriptionRecord> {
        self.history.lock().await.last().cloned()
    }

    async fn append(&self, record: PrescriptionRecord) -> Result<Appended, AppError> {
        let mut history = self.history.lock().await;

        if let Some(last) = history.last() {
            if last.week_key == record.week_key {
                return Ok(Appended::Conflict(Box::new(last.clone())));
            }
        }

        let previous = (history.current_week.clone(), history.week_start_date);

        history.current_week = Some(record.week_key.clone());
        history.week_start_date = Some(localize(
            monday_of(record.timestamp.with_timezone(&Local).date_naive()).and_time(NaiveTime::MIN),
        ));
        history.prescriptions.push(record);

        if let Err(e) = persist(&self.path, &history).await {
            warn!("Failed to persist history, rolling back: {e}");

            history.prescriptions.pop();
            history.current_week = previous.0;
            history.week_start_date = previous.1;

            return Err(e);
        }

        #[cfg(feature = "verbose")]
        info!("History now holds {} prescriptions", history.prescriptions.len());

        Ok(Appended::Inserted)
    }
}

async fn persist(path: &Path, history: &PrescriptionHistory) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let tmp = sibling(path, "tmp");
    let written = match fs::write(&tmp, serde_json::to_vec_pretty(history)?).await {
        Ok(()) => fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    Ok(())
}

/// `h.json` -> `h.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);

    PathBuf::from(name)
}
